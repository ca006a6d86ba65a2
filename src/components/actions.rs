use super::Execution;
use crate::ast::Value;
use crate::error::ExecutionError;
use crate::runtime::{ExecutionContext, RuntimeHost};

pub(super) fn date_now<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
) -> Result<Execution, ExecutionError> {
    let now = Value::Date(ctx.system_time_millis());
    ctx.propagate("value", now);
    Ok(Execution::Completed)
}

fn setting_key<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    key: &str,
) -> Result<String, ExecutionError> {
    Ok(match ctx.eval(key)? {
        Value::String(key) => key,
        other => other.to_string(),
    })
}

pub(super) fn read_setting<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    key: &str,
) -> Result<Execution, ExecutionError> {
    let key = setting_key(ctx, key)?;
    let value = ctx
        .host()
        .read_setting(&key)
        .ok_or_else(|| ExecutionError::Resource(format!("setting '{key}' not found")))?;
    ctx.propagate("value", value);
    Ok(Execution::Completed)
}

pub(super) fn write_settings<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    key: &str,
    value: &str,
) -> Result<Execution, ExecutionError> {
    let key = setting_key(ctx, key)?;
    let value = ctx.eval(value)?;
    ctx.host().write_setting(&key, value);
    Ok(Execution::Completed)
}

pub(super) fn log<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    value: &str,
) -> Result<Execution, ExecutionError> {
    let value = ctx.eval(value)?;
    ctx.log_info(&value);
    Ok(Execution::Completed)
}
