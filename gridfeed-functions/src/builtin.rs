//! Warehouse-backed functions.

use crate::registry::{Arg, FunctionDescriptor, FunctionRegistry, InvocationContext, Shape};
use gridfeed_core::data::Metric;
use gridfeed_core::{fetch, layoffs, summarize, Grid, GridError, QueryName};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register(
        FunctionDescriptor::new(
            "layoffs_fyi",
            "Latest layoffs tracker snapshot, newest dates first.",
            Shape::Table,
        ),
        layoffs_fyi,
    );
    registry.register(
        FunctionDescriptor::new(
            "loopnet_usd_sqft",
            "Daily asking rent in USD per square foot per year, by address.",
            Shape::Table,
        ),
        loopnet_usd_sqft,
    );
    registry.register(
        FunctionDescriptor::new(
            "loopnet_sqft",
            "Daily minimum available square footage, by address.",
            Shape::Table,
        ),
        loopnet_sqft,
    );
}

fn layoffs_fyi(ctx: &InvocationContext<'_>, _args: &[Arg]) -> Result<Grid, GridError> {
    let raw = fetch(ctx.warehouse, &ctx.config.tables, QueryName::Layoffs)?;
    layoffs::report(raw)
}

fn loopnet_usd_sqft(ctx: &InvocationContext<'_>, _args: &[Arg]) -> Result<Grid, GridError> {
    loopnet_summary(ctx, Metric::UsdPerSqftYear)
}

fn loopnet_sqft(ctx: &InvocationContext<'_>, _args: &[Arg]) -> Result<Grid, GridError> {
    loopnet_summary(ctx, Metric::MinSizeSqft)
}

fn loopnet_summary(ctx: &InvocationContext<'_>, metric: Metric) -> Result<Grid, GridError> {
    let raw = fetch(ctx.warehouse, &ctx.config.tables, QueryName::RealEstate)?;
    Ok(summarize(&raw, metric)?.into())
}
