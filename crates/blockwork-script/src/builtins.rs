//! Built-in functions.

use std::rc::Rc;

use crate::ast::BinOp;
use crate::error::{index_error, type_error, value_error, ScriptError};
use crate::ops::{self, Dense};
use crate::value::{ArrayRef, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Builtin {
    Sum,
    Mean,
    Min,
    Max,
    Abs,
    Sqrt,
    Exp,
    Floor,
    Len,
    Shape,
    Zeros,
    Defined,
    Print,
}

#[derive(Clone, Copy)]
enum Reduction {
    Sum,
    Mean,
    Min,
    Max,
}

impl Builtin {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "sum" => Self::Sum,
            "mean" => Self::Mean,
            "min" => Self::Min,
            "max" => Self::Max,
            "abs" => Self::Abs,
            "sqrt" => Self::Sqrt,
            "exp" => Self::Exp,
            "floor" => Self::Floor,
            "len" => Self::Len,
            "shape" => Self::Shape,
            "zeros" => Self::Zeros,
            "defined" => Self::Defined,
            "print" => Self::Print,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Sqrt => "sqrt",
            Self::Exp => "exp",
            Self::Floor => "floor",
            Self::Len => "len",
            Self::Shape => "shape",
            Self::Zeros => "zeros",
            Self::Defined => "defined",
            Self::Print => "print",
        }
    }
}

/// Call `builtin`. `is_defined` answers `defined("name")`.
pub(crate) fn call(
    builtin: Builtin,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    is_defined: impl Fn(&str) -> bool,
) -> Result<Value, ScriptError> {
    let name = builtin.name();
    let reduction = match builtin {
        Builtin::Sum => Some(Reduction::Sum),
        Builtin::Mean => Some(Reduction::Mean),
        Builtin::Min => Some(Reduction::Min),
        Builtin::Max => Some(Reduction::Max),
        _ => None,
    };
    if let Some(reduction) = reduction {
        let axis = axis_kwarg(name, kwargs)?;
        let [arg] = exactly::<1>(name, args)?;
        return reduce(reduction, name, &arg, axis);
    }
    if let Some((key, _)) = kwargs.first() {
        return Err(type_error(format!(
            "{name}() got an unexpected keyword argument '{key}'"
        )));
    }
    match builtin {
        Builtin::Abs => {
            let [x] = exactly::<1>(name, args)?;
            ops::map(&x, name, f64::abs)
        }
        Builtin::Sqrt => {
            let [x] = exactly::<1>(name, args)?;
            ops::map(&x, name, f64::sqrt)
        }
        Builtin::Exp => {
            let [x] = exactly::<1>(name, args)?;
            ops::map(&x, name, f64::exp)
        }
        Builtin::Floor => {
            let [x] = exactly::<1>(name, args)?;
            ops::map(&x, name, f64::floor)
        }
        Builtin::Len => {
            let [x] = exactly::<1>(name, args)?;
            let n = match &x {
                Value::List(items) => items.len(),
                Value::Str(s) => s.chars().count(),
                Value::Slices(s) => s.len(),
                Value::Array(a) if a.ndim() > 0 => a.shape()[0],
                other => {
                    return Err(type_error(format!(
                        "object of type {} has no len()",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Number(n as f64))
        }
        Builtin::Shape => {
            let [x] = exactly::<1>(name, args)?;
            let d = ops::to_dense(&x)?;
            Ok(list_of(d.shape.iter().map(|&n| n as f64)))
        }
        Builtin::Zeros => {
            let [shape] = exactly::<1>(name, args)?;
            let shape = shape_arg(&shape)?;
            let n = shape.iter().product();
            Ok(Value::Array(ArrayRef::local(shape, vec![0.0; n])))
        }
        Builtin::Defined => {
            let [x] = exactly::<1>(name, args)?;
            match &x {
                Value::Str(s) => Ok(Value::Number(if is_defined(s) { 1.0 } else { 0.0 })),
                other => Err(type_error(format!(
                    "defined() expects a name string, got {}",
                    other.type_name()
                ))),
            }
        }
        Builtin::Print => {
            let line = args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            tracing::info!(target: "blockwork_script", "{line}");
            Ok(Value::None)
        }
        Builtin::Sum | Builtin::Mean | Builtin::Min | Builtin::Max => {
            unreachable!("reductions handled above")
        }
    }
}

fn exactly<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], ScriptError> {
    let got = args.len();
    args.try_into().map_err(|_| {
        type_error(format!(
            "{name}() takes exactly {N} argument{} ({got} given)",
            if N == 1 { "" } else { "s" }
        ))
    })
}

fn list_of(values: impl Iterator<Item = f64>) -> Value {
    Value::List(Rc::new(values.map(Value::Number).collect()))
}

fn as_integer(value: &Value, what: &str) -> Result<i64, ScriptError> {
    match value {
        Value::Number(v) if v.fract() == 0.0 => Ok(*v as i64),
        other => Err(type_error(format!("{what} must be an integer, got {other}"))),
    }
}

fn shape_arg(value: &Value) -> Result<Vec<usize>, ScriptError> {
    let dims = match value {
        Value::List(items) => items
            .iter()
            .map(|v| as_integer(v, "shape entry"))
            .collect::<Result<Vec<_>, _>>()?,
        other => vec![as_integer(other, "shape")?],
    };
    dims.into_iter()
        .map(|d| usize::try_from(d).map_err(|_| value_error("negative dimensions are not allowed")))
        .collect()
}

fn axis_kwarg(name: &str, kwargs: Vec<(String, Value)>) -> Result<Option<i64>, ScriptError> {
    let mut axis = None;
    for (key, value) in kwargs {
        if key != "axis" {
            return Err(type_error(format!(
                "{name}() got an unexpected keyword argument '{key}'"
            )));
        }
        axis = match value {
            Value::None => None,
            other => Some(as_integer(&other, "axis")?),
        };
    }
    Ok(axis)
}

fn reduce(
    reduction: Reduction,
    name: &str,
    value: &Value,
    axis: Option<i64>,
) -> Result<Value, ScriptError> {
    // sum over a list adds its items elementwise, starting from zero
    if let (Reduction::Sum, Value::List(items), None) = (reduction, value, axis) {
        return items
            .iter()
            .try_fold(Value::Number(0.0), |acc, item| ops::binary(BinOp::Add, &acc, item));
    }
    let d = match value {
        Value::Array(_) | Value::List(_) | Value::Number(_) => ops::to_dense(value)?,
        other => {
            return Err(type_error(format!(
                "{name}() expects an array, got {}",
                other.type_name()
            )))
        }
    };
    let Some(axis) = axis else {
        return Ok(Value::Number(fold(reduction, name, &d.data)?));
    };

    let ndim = d.shape.len() as i64;
    let a = if axis < 0 { axis + ndim } else { axis };
    if a < 0 || a >= ndim {
        return Err(index_error(format!(
            "axis {axis} is out of bounds for array of dimension {ndim}"
        )));
    }
    let a = a as usize;
    let outer: usize = d.shape[..a].iter().product();
    let len = d.shape[a];
    let inner: usize = d.shape[a + 1..].iter().product();
    let mut data = Vec::with_capacity(outer * inner);
    let mut lane = Vec::with_capacity(len);
    for o in 0..outer {
        for i in 0..inner {
            lane.clear();
            lane.extend((0..len).map(|k| d.data[(o * len + k) * inner + i]));
            data.push(fold(reduction, name, &lane)?);
        }
    }
    let mut shape = d.shape.clone();
    shape.remove(a);
    Ok(Dense { shape, data }.into_value())
}

fn fold(reduction: Reduction, name: &str, values: &[f64]) -> Result<f64, ScriptError> {
    match reduction {
        Reduction::Sum => Ok(values.iter().sum()),
        Reduction::Mean => Ok(values.iter().sum::<f64>() / values.len() as f64),
        Reduction::Min | Reduction::Max => {
            let pick = if matches!(reduction, Reduction::Min) { f64::min } else { f64::max };
            values
                .iter()
                .copied()
                .reduce(pick)
                .ok_or_else(|| value_error(format!("{name}() of an empty sequence")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(shape: Vec<usize>, data: Vec<f64>) -> Value {
        Value::Array(ArrayRef::local(shape, data))
    }

    fn run(b: Builtin, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, ScriptError> {
        call(b, args, kwargs, |_| false)
    }

    fn number(v: Value) -> f64 {
        match v {
            Value::Number(n) => n,
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn reductions_over_everything() {
        let a = arr(vec![2, 2], vec![1.0, 2.0, 3.0, 6.0]);
        assert_eq!(number(run(Builtin::Sum, vec![a.clone()], vec![]).unwrap()), 12.0);
        assert_eq!(number(run(Builtin::Mean, vec![a.clone()], vec![]).unwrap()), 3.0);
        assert_eq!(number(run(Builtin::Min, vec![a.clone()], vec![]).unwrap()), 1.0);
        assert_eq!(number(run(Builtin::Max, vec![a], vec![]).unwrap()), 6.0);
    }

    #[test]
    fn reductions_along_an_axis() {
        let a = arr(vec![2, 3], vec![1.0, 5.0, 3.0, 4.0, 2.0, 6.0]);
        let axis = |n: f64| vec![("axis".to_string(), Value::Number(n))];
        let max0 = ops::to_dense(&run(Builtin::Max, vec![a.clone()], axis(0.0)).unwrap()).unwrap();
        assert_eq!(max0.data, vec![4.0, 5.0, 6.0]);
        let sum1 = ops::to_dense(&run(Builtin::Sum, vec![a.clone()], axis(-1.0)).unwrap()).unwrap();
        assert_eq!(sum1.data, vec![9.0, 12.0]);
        assert!(run(Builtin::Mean, vec![a], axis(2.0)).is_err());
    }

    #[test]
    fn sum_of_a_list_adds_items_elementwise() {
        let items = Value::List(Rc::new(vec![
            arr(vec![2], vec![1.0, 2.0]),
            arr(vec![2], vec![10.0, 20.0]),
        ]));
        let d = ops::to_dense(&run(Builtin::Sum, vec![items], vec![]).unwrap()).unwrap();
        assert_eq!(d.data, vec![11.0, 22.0]);
    }

    #[test]
    fn argument_checking() {
        assert!(run(Builtin::Abs, vec![], vec![]).is_err());
        assert!(run(Builtin::Abs, vec![Value::Number(1.0)], vec![("x".into(), Value::None)]).is_err());
        assert!(run(Builtin::Max, vec![arr(vec![0], vec![])], vec![]).is_err());
        assert!(run(Builtin::Len, vec![Value::Number(1.0)], vec![]).is_err());
    }

    #[test]
    fn zeros_and_shape() {
        let z = run(Builtin::Zeros, vec![Value::List(Rc::new(vec![Value::Number(2.0), Value::Number(3.0)]))], vec![]).unwrap();
        let s = run(Builtin::Shape, vec![z], vec![]).unwrap();
        assert_eq!(s.to_string(), "[2, 3]");
        assert!(run(Builtin::Zeros, vec![Value::Number(-1.0)], vec![]).is_err());
    }

    #[test]
    fn defined_consults_the_namespace() {
        let v = call(Builtin::Defined, vec![Value::Str(Rc::from("a"))], vec![], |n| n == "a").unwrap();
        assert_eq!(number(v), 1.0);
    }
}
