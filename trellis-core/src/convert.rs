//! Type conversion of configured values.
//!
//! Applied to constructor arguments and property values after reference
//! resolution. The default converter covers the scalar coercions the
//! configuration layer produces; anything richer is plugged in via
//! `DefaultListableBeanFactory::set_type_converter`.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::definition::{BeanValue, TargetType};
use crate::error::{ContainerError, ContainerResult};

/// Converts a configured value into the requested target type.
pub trait TypeConverter: Send + Sync {
    /// Produces a value assignable to `target`, or the value's natural type
    /// when no target is required. Runtime references must already be
    /// resolved; an unresolved [`BeanValue::Ref`] is a conversion error.
    fn convert(
        &self,
        value: BeanValue,
        target: Option<&TargetType>,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>>;
}

fn conversion_error(value: &BeanValue, target: &str) -> ContainerError {
    ContainerError::Conversion {
        value: value.describe(),
        target: target.to_string(),
    }
}

/// Default scalar converter.
pub struct SimpleTypeConverter;

impl SimpleTypeConverter {
    fn convert_untargeted(value: BeanValue) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        match value {
            BeanValue::Str(s) => Ok(Arc::new(s)),
            BeanValue::Int(i) => Ok(Arc::new(i)),
            BeanValue::Float(f) => Ok(Arc::new(f)),
            BeanValue::Bool(b) => Ok(Arc::new(b)),
            BeanValue::Instance(instance) => Ok(instance),
            list @ BeanValue::List(_) => Self::convert_homogeneous_list(list),
            value @ BeanValue::Ref(_) => Err(conversion_error(&value, "<unresolved reference>")),
        }
    }

    /// Untargeted lists convert element-wise when homogeneous.
    fn convert_homogeneous_list(value: BeanValue) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        let BeanValue::List(items) = &value else {
            unreachable!("caller matched List");
        };
        if items.iter().all(|v| matches!(v, BeanValue::Str(_))) {
            return Ok(Arc::new(collect_strings(items)?));
        }
        if items.iter().all(|v| matches!(v, BeanValue::Int(_))) {
            return Ok(Arc::new(collect_ints(items)?));
        }
        if items.iter().all(|v| matches!(v, BeanValue::Float(_))) {
            return Ok(Arc::new(collect_floats(items)?));
        }
        if items.iter().all(|v| matches!(v, BeanValue::Bool(_))) {
            return Ok(Arc::new(collect_bools(items)?));
        }
        Err(conversion_error(&value, "<homogeneous list>"))
    }
}

fn as_string(value: &BeanValue) -> ContainerResult<String> {
    match value {
        BeanValue::Str(s) => Ok(s.clone()),
        BeanValue::Int(i) => Ok(i.to_string()),
        BeanValue::Float(f) => Ok(f.to_string()),
        BeanValue::Bool(b) => Ok(b.to_string()),
        other => Err(conversion_error(other, "String")),
    }
}

fn as_i64(value: &BeanValue) -> ContainerResult<i64> {
    match value {
        BeanValue::Int(i) => Ok(*i),
        BeanValue::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| conversion_error(value, "i64")),
        other => Err(conversion_error(other, "i64")),
    }
}

fn as_f64(value: &BeanValue) -> ContainerResult<f64> {
    match value {
        BeanValue::Float(f) => Ok(*f),
        BeanValue::Int(i) => Ok(*i as f64),
        BeanValue::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| conversion_error(value, "f64")),
        other => Err(conversion_error(other, "f64")),
    }
}

fn as_bool(value: &BeanValue) -> ContainerResult<bool> {
    match value {
        BeanValue::Bool(b) => Ok(*b),
        BeanValue::Str(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(conversion_error(value, "bool")),
        },
        other => Err(conversion_error(other, "bool")),
    }
}

fn collect_strings(items: &[BeanValue]) -> ContainerResult<Vec<String>> {
    items.iter().map(as_string).collect()
}

fn collect_ints(items: &[BeanValue]) -> ContainerResult<Vec<i64>> {
    items.iter().map(as_i64).collect()
}

fn collect_floats(items: &[BeanValue]) -> ContainerResult<Vec<f64>> {
    items.iter().map(as_f64).collect()
}

fn collect_bools(items: &[BeanValue]) -> ContainerResult<Vec<bool>> {
    items.iter().map(as_bool).collect()
}

impl TypeConverter for SimpleTypeConverter {
    fn convert(
        &self,
        value: BeanValue,
        target: Option<&TargetType>,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        let Some(target) = target else {
            return Self::convert_untargeted(value);
        };

        // A pre-resolved instance must already be of the requested type.
        if let BeanValue::Instance(instance) = &value {
            return if (**instance).type_id() == target.id {
                Ok(Arc::clone(instance))
            } else {
                Err(conversion_error(&value, target.name))
            };
        }

        let id = target.id;
        if id == TypeId::of::<String>() {
            return Ok(Arc::new(as_string(&value)?));
        }
        if id == TypeId::of::<i64>() {
            return Ok(Arc::new(as_i64(&value)?));
        }
        if id == TypeId::of::<f64>() {
            return Ok(Arc::new(as_f64(&value)?));
        }
        if id == TypeId::of::<bool>() {
            return Ok(Arc::new(as_bool(&value)?));
        }
        if id == TypeId::of::<Vec<String>>() {
            return match &value {
                BeanValue::List(items) => Ok(Arc::new(collect_strings(items)?)),
                // A comma-separated string is accepted for string lists.
                BeanValue::Str(s) => Ok(Arc::new(
                    s.split(',')
                        .map(|item| item.trim().to_string())
                        .filter(|item| !item.is_empty())
                        .collect::<Vec<String>>(),
                )),
                other => Err(conversion_error(other, target.name)),
            };
        }
        if id == TypeId::of::<Vec<i64>>() {
            return match &value {
                BeanValue::List(items) => Ok(Arc::new(collect_ints(items)?)),
                other => Err(conversion_error(other, target.name)),
            };
        }
        if id == TypeId::of::<Vec<f64>>() {
            return match &value {
                BeanValue::List(items) => Ok(Arc::new(collect_floats(items)?)),
                other => Err(conversion_error(other, target.name)),
            };
        }
        if id == TypeId::of::<Vec<bool>>() {
            return match &value {
                BeanValue::List(items) => Ok(Arc::new(collect_bools(items)?)),
                other => Err(conversion_error(other, target.name)),
            };
        }

        Err(conversion_error(&value, target.name))
    }
}
