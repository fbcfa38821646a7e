//! Arithmetic with NumPy-style broadcasting.

use std::rc::Rc;

use crate::ast::BinOp;
use crate::error::{type_error, value_error, ErrorKind, ScriptError};
use crate::value::{ArrayRef, Value};

/// A value materialized as a row-major block of `f64`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Dense {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Dense {
    pub(crate) fn into_value(self) -> Value {
        if self.shape.is_empty() {
            Value::Number(self.data.first().copied().unwrap_or(f64::NAN))
        } else {
            Value::Array(ArrayRef::local(self.shape, self.data))
        }
    }
}

/// Numbers, arrays, and (nested) lists of equal-shaped items.
pub(crate) fn to_dense(value: &Value) -> Result<Dense, ScriptError> {
    match value {
        Value::Number(v) => Ok(Dense {
            shape: Vec::new(),
            data: vec![*v],
        }),
        Value::Array(a) => Ok(Dense {
            shape: a.shape().to_vec(),
            data: a.to_vec(),
        }),
        Value::List(items) => {
            let parts = items.iter().map(to_dense).collect::<Result<Vec<_>, _>>()?;
            let inner = parts.first().map(|p| p.shape.clone()).unwrap_or_default();
            if parts.iter().any(|p| p.shape != inner) {
                return Err(value_error("list items have inconsistent shapes"));
            }
            let mut shape = vec![parts.len()];
            shape.extend(inner);
            let data = parts.into_iter().flat_map(|p| p.data).collect();
            Ok(Dense { shape, data })
        }
        other => Err(type_error(format!(
            "expected a number or array, got {}",
            other.type_name()
        ))),
    }
}

/// Shape two operands broadcast to.
pub(crate) fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>, ScriptError> {
    let n = a.len().max(b.len());
    let mut out = vec![0; n];
    for i in 0..n {
        let da = if i < n - a.len() { 1 } else { a[i - (n - a.len())] };
        let db = if i < n - b.len() { 1 } else { b[i - (n - b.len())] };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => {
                return Err(value_error(format!(
                    "operands could not be broadcast together with shapes {a:?} {b:?}"
                )))
            }
        };
    }
    Ok(out)
}

/// Expand `d` to `target`, which must be a broadcast of `d.shape`.
pub(crate) fn broadcast_to(d: &Dense, target: &[usize]) -> Vec<f64> {
    if d.shape == target {
        return d.data.clone();
    }
    let n: usize = target.iter().product();
    let lead = target.len() - d.shape.len();
    // Source strides aligned to the target, zero on broadcast axes.
    let mut strides = vec![0usize; target.len()];
    let mut s = 1usize;
    for i in (0..d.shape.len()).rev() {
        if d.shape[i] != 1 {
            strides[lead + i] = s;
        }
        s *= d.shape[i];
    }
    let mut out = Vec::with_capacity(n);
    if n == 0 {
        return out;
    }
    let mut idx = vec![0usize; target.len()];
    let mut src = 0usize;
    loop {
        out.push(d.data[src]);
        let mut k = target.len();
        loop {
            if k == 0 {
                return out;
            }
            k -= 1;
            idx[k] += 1;
            src += strides[k];
            if idx[k] < target[k] {
                break;
            }
            src -= strides[k] * target[k];
            idx[k] = 0;
        }
    }
}

fn py_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

fn apply(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Mod => py_mod(a, b),
    }
}

/// `left op right`. Scalar division by zero raises; array division
/// follows IEEE arithmetic.
pub(crate) fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, ScriptError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if *b == 0.0 && matches!(op, BinOp::Div | BinOp::Mod) {
                let what = if op == BinOp::Div { "division" } else { "modulo" };
                return Err(ScriptError::runtime(
                    ErrorKind::ZeroDivision,
                    format!("{what} by zero"),
                ));
            }
            Ok(Value::Number(apply(op, *a, *b)))
        }
        (Value::Str(a), Value::Str(b)) if op == BinOp::Add => {
            Ok(Value::Str(Rc::from(format!("{a}{b}"))))
        }
        _ => {
            let (a, b) = match (to_dense(left), to_dense(right)) {
                (Ok(a), Ok(b)) => (a, b),
                _ => {
                    return Err(type_error(format!(
                        "unsupported operand types for {}: {} and {}",
                        op.symbol(),
                        left.type_name(),
                        right.type_name()
                    )))
                }
            };
            let shape = broadcast_shape(&a.shape, &b.shape)?;
            let xs = broadcast_to(&a, &shape);
            let ys = broadcast_to(&b, &shape);
            let data = xs.iter().zip(&ys).map(|(&x, &y)| apply(op, x, y)).collect();
            Ok(Dense { shape, data }.into_value())
        }
    }
}

/// Elementwise map over a number or array.
pub(crate) fn map(value: &Value, what: &str, f: impl Fn(f64) -> f64) -> Result<Value, ScriptError> {
    match value {
        Value::Number(v) => Ok(Value::Number(f(*v))),
        Value::Array(_) | Value::List(_) => {
            let mut d = to_dense(value)?;
            d.data.iter_mut().for_each(|v| *v = f(*v));
            Ok(d.into_value())
        }
        other => Err(type_error(format!(
            "bad operand type for {what}: {}",
            other.type_name()
        ))),
    }
}

/// Write `value`, broadcast to the view's shape, into `view`.
pub(crate) fn assign_into(view: &ArrayRef, value: &Value) -> Result<(), ScriptError> {
    let d = to_dense(value)?;
    let shape = broadcast_shape(&d.shape, view.shape())?;
    if shape != view.shape() {
        return Err(value_error(format!(
            "could not broadcast input of shape {:?} into shape {:?}",
            d.shape,
            view.shape()
        )));
    }
    let values = broadcast_to(&d, view.shape());
    view.assign(&values);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(shape: Vec<usize>, data: Vec<f64>) -> Value {
        Value::Array(ArrayRef::local(shape, data))
    }

    fn dense(v: &Value) -> Dense {
        to_dense(v).unwrap()
    }

    #[test]
    fn scalar_division_by_zero_raises() {
        let err = binary(BinOp::Div, &Value::Number(1.0), &Value::Number(0.0)).unwrap_err();
        assert!(matches!(err, ScriptError::Runtime { kind: ErrorKind::ZeroDivision, .. }));
        assert!(binary(BinOp::Mod, &Value::Number(1.0), &Value::Number(0.0)).is_err());
    }

    #[test]
    fn array_division_by_zero_is_ieee() {
        let v = binary(BinOp::Div, &arr(vec![2], vec![1.0, -1.0]), &Value::Number(0.0)).unwrap();
        assert_eq!(dense(&v).data, vec![f64::INFINITY, f64::NEG_INFINITY]);
    }

    #[test]
    fn modulo_takes_the_sign_of_the_divisor() {
        let v = binary(BinOp::Mod, &Value::Number(-7.0), &Value::Number(3.0)).unwrap();
        assert!(matches!(v, Value::Number(r) if r == 2.0));
    }

    #[test]
    fn broadcasting_rows_against_columns() {
        let col = arr(vec![2, 1], vec![10.0, 20.0]);
        let row = arr(vec![3], vec![1.0, 2.0, 3.0]);
        let d = dense(&binary(BinOp::Add, &col, &row).unwrap());
        assert_eq!(d.shape, vec![2, 3]);
        assert_eq!(d.data, vec![11.0, 12.0, 13.0, 21.0, 22.0, 23.0]);
    }

    #[test]
    fn incompatible_shapes_are_rejected() {
        let a = arr(vec![2], vec![1.0, 2.0]);
        let b = arr(vec![3], vec![1.0, 2.0, 3.0]);
        assert!(binary(BinOp::Add, &a, &b).is_err());
        assert!(binary(BinOp::Add, &a, &Value::None).is_err());
    }

    #[test]
    fn lists_become_arrays() {
        let list = Value::List(Rc::new(vec![Value::Number(1.0), Value::Number(2.0)]));
        let d = dense(&binary(BinOp::Mul, &list, &Value::Number(2.0)).unwrap());
        assert_eq!(d, Dense { shape: vec![2], data: vec![2.0, 4.0] });
    }

    #[test]
    fn assignment_broadcasts_but_never_grows() {
        let target = ArrayRef::local(vec![2, 2], vec![0.0; 4]);
        assign_into(&target, &Value::Number(5.0)).unwrap();
        assert_eq!(target.to_vec(), vec![5.0; 4]);
        assign_into(&target, &arr(vec![2], vec![1.0, 2.0])).unwrap();
        assert_eq!(target.to_vec(), vec![1.0, 2.0, 1.0, 2.0]);
        assert!(assign_into(&target, &arr(vec![3], vec![0.0; 3])).is_err());
        let small = ArrayRef::local(vec![1], vec![0.0]);
        assert!(assign_into(&small, &arr(vec![2], vec![0.0; 2])).is_err());
    }
}
