//! Type resolution: external type descriptors to engine `TypeInfo`.
//!
//! Temporal values are always microseconds since epoch inside the engine.
//! The resolver only tags; the converter does the scaling when it
//! materializes literals.

use rexc_core::config::PlannerConfig;
use rexc_core::error::{Error, Result};
use rexc_core::rex::{RelType, SqlTypeName};
use rexc_core::schema::{TypeInfo, ValueType};

/// Map an external type descriptor to the engine's value type.
pub fn resolve_type(ty: &RelType, config: &PlannerConfig) -> Result<TypeInfo> {
    use SqlTypeName::*;

    let resolved = match ty.kind {
        Boolean => TypeInfo::new(ValueType::Boolean),
        TinyInt => TypeInfo::new(ValueType::TinyInt),
        SmallInt => TypeInfo::new(ValueType::SmallInt),
        Integer => TypeInfo::new(ValueType::Integer),
        BigInt => TypeInfo::new(ValueType::BigInt),
        Real | Float | Double => TypeInfo::new(ValueType::Float),
        Decimal => resolve_decimal(ty, config)?,
        Char | Varchar => TypeInfo::new(ValueType::String).with_width(ty.precision),
        Binary | Varbinary => TypeInfo::new(ValueType::VarBinary).with_width(ty.precision),
        Date | Timestamp => TypeInfo::timestamp(),
        IntervalYearMonth | IntervalDayTime => TypeInfo::interval(),
        Null => TypeInfo::new(ValueType::Null),
        Time | Any | Symbol | Array | Map => {
            return Err(Error::TypeResolution(format!(
                "no engine type for {:?}",
                ty.kind
            )))
        }
    };

    Ok(resolved.with_nullable(ty.nullable))
}

fn resolve_decimal(ty: &RelType, config: &PlannerConfig) -> Result<TypeInfo> {
    let precision = ty.precision.unwrap_or(config.max_decimal_precision);
    let scale = ty.scale.unwrap_or(0);

    if precision > config.max_decimal_precision {
        return Err(Error::TypeResolution(format!(
            "DECIMAL precision {} exceeds the maximum of {}",
            precision, config.max_decimal_precision
        )));
    }
    if scale > config.max_decimal_scale {
        return Err(Error::TypeResolution(format!(
            "DECIMAL scale {} exceeds the maximum of {}",
            scale, config.max_decimal_scale
        )));
    }
    if scale > precision {
        return Err(Error::TypeResolution(format!(
            "DECIMAL scale {} exceeds its precision {}",
            scale, precision
        )));
    }

    Ok(TypeInfo::decimal(precision, scale))
}

/// Result type of a binary arithmetic node from its operand types.
///
/// FLOAT wins over DECIMAL, DECIMAL over the integers, and integers widen to
/// BIGINT. A NULL operand takes the other side's type. Anything non-numeric
/// yields `Invalid`, which type finalization reports.
pub fn promote_arithmetic(left: &TypeInfo, right: &TypeInfo, config: &PlannerConfig) -> TypeInfo {
    let (l, r) = (left.value_type, right.value_type);
    let nullable = left.nullable || right.nullable;

    let promoted = match (l, r) {
        (ValueType::Null, ValueType::Null) => TypeInfo::new(ValueType::Null),
        (ValueType::Null, other) | (other, ValueType::Null) if other.is_numeric() => {
            widen(other, config)
        }
        (a, b) if a.is_numeric() && b.is_numeric() => {
            if a == ValueType::Float || b == ValueType::Float {
                TypeInfo::new(ValueType::Float)
            } else if a == ValueType::Decimal || b == ValueType::Decimal {
                engine_decimal(config)
            } else {
                TypeInfo::bigint()
            }
        }
        _ => TypeInfo::invalid(),
    };

    promoted.with_nullable(nullable)
}

fn widen(vt: ValueType, config: &PlannerConfig) -> TypeInfo {
    match vt {
        ValueType::Float => TypeInfo::new(ValueType::Float),
        ValueType::Decimal => engine_decimal(config),
        _ => TypeInfo::bigint(),
    }
}

/// The engine computes all DECIMAL arithmetic at its maximum precision/scale.
fn engine_decimal(config: &PlannerConfig) -> TypeInfo {
    TypeInfo::decimal(config.max_decimal_precision, config.max_decimal_scale)
}
