//! The kernel-script interpreter: one persistent namespace per context.

use std::rc::Rc;

use indexmap::IndexMap;

use blockwork_core::{ArrayBinding, Binding, EngineError, ExecutionContext, Primitive, SharedBuffer};

use crate::ast::{Expr, Program, Statement, Subscript, Target};
use crate::builtins::{self, Builtin};
use crate::error::{index_error, type_error, ErrorKind, ScriptError};
use crate::ops;
use crate::parser::parse;
use crate::value::{ArrayRef, Record, RecordType, Sub, Value};

/// Parsed programs kept per interpreter, keyed by source text.
const PROGRAM_CACHE_SIZE: usize = 32;

/// A kernel-script execution context.
///
/// Names assigned by one call to [`run`](Interpreter::run) stay bound for
/// later calls until deleted. Arrays bound from host buffers alias them:
/// writes through any view land in the host storage.
///
/// ```
/// use blockwork_script::Interpreter;
///
/// let mut interp = Interpreter::new();
/// interp.run("a = [1, 2, 3] * 2\ntotal = sum(a)").unwrap();
/// assert_eq!(interp.number("total"), Some(12.0));
/// ```
#[derive(Debug, Default)]
pub struct Interpreter {
    globals: IndexMap<String, Value>,
    programs: IndexMap<String, Rc<Program>>,
}

impl Interpreter {
    /// An interpreter with an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and execute `code`.
    pub fn run(&mut self, code: &str) -> Result<(), ScriptError> {
        let program = self.program(code)?;
        for (stmt, span) in &program.statements {
            self.exec_statement(stmt).map_err(|e| e.at_line(span.line))?;
        }
        Ok(())
    }

    /// The value of `name` if it is bound to a number.
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.globals.get(name) {
            Some(Value::Number(v)) => Some(*v),
            _ => None,
        }
    }

    fn program(&mut self, code: &str) -> Result<Rc<Program>, ScriptError> {
        if let Some(program) = self.programs.get(code) {
            return Ok(Rc::clone(program));
        }
        let program = Rc::new(parse(code)?);
        if self.programs.len() >= PROGRAM_CACHE_SIZE {
            self.programs.shift_remove_index(0);
        }
        self.programs.insert(code.to_string(), Rc::clone(&program));
        Ok(program)
    }

    fn exec_statement(&mut self, stmt: &Statement) -> Result<(), ScriptError> {
        match stmt {
            Statement::Assign { target: Target::Name(name), value } => {
                let value = self.eval(value)?;
                self.globals.insert(name.clone(), value);
            }
            Statement::Assign {
                target: Target::Index { base, subs },
                value,
            } => {
                let value = self.eval(value)?;
                let base = self.eval(base)?;
                let Value::Array(array) = base else {
                    return Err(type_error(format!(
                        "'{}' object does not support item assignment",
                        base.type_name()
                    )));
                };
                let subs = self.eval_subscripts(subs)?;
                let view = array.view(&subs)?;
                ops::assign_into(&view, &value)?;
            }
            Statement::Record { name, fields } => {
                let ty = RecordType {
                    name: name.clone(),
                    fields: fields.clone(),
                };
                self.globals.insert(name.clone(), Value::RecordType(Rc::new(ty)));
            }
            Statement::Del(names) => {
                for name in names {
                    if self.globals.shift_remove(name).is_none() {
                        return Err(name_error(name));
                    }
                }
            }
            Statement::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Number(v) => Ok(Value::Number(*v)),
            Expr::Str(s) => Ok(Value::Str(Rc::from(s.as_str()))),
            Expr::Name(name) => match self.globals.get(name) {
                Some(v) => Ok(v.clone()),
                None => Builtin::lookup(name)
                    .map(Value::Builtin)
                    .ok_or_else(|| name_error(name)),
            },
            Expr::List(items) => {
                let items = items.iter().map(|e| self.eval(e)).collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(Rc::new(items)))
            }
            Expr::Neg(operand) => {
                let v = self.eval(operand)?;
                ops::map(&v, "unary -", |x| -x)
            }
            Expr::Binary { left, op, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                ops::binary(*op, &l, &r)
            }
            Expr::Attr { base, name } => {
                let base = self.eval(base)?;
                attribute(&base, name)
            }
            Expr::Index { base, subs } => {
                let base = self.eval(base)?;
                self.index(&base, subs)
            }
            Expr::Call { func, args, kwargs } => {
                let func = self.eval(func)?;
                let args = args.iter().map(|e| self.eval(e)).collect::<Result<Vec<_>, _>>()?;
                let kwargs = kwargs
                    .iter()
                    .map(|(k, e)| Ok((k.clone(), self.eval(e)?)))
                    .collect::<Result<Vec<_>, ScriptError>>()?;
                self.call(func, args, kwargs)
            }
        }
    }

    fn call(
        &self,
        func: Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, ScriptError> {
        match func {
            Value::Builtin(b) => builtins::call(b, args, kwargs, |n| self.globals.contains_key(n)),
            Value::RecordType(ty) => construct(ty, args, kwargs),
            other => Err(type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn index(&self, base: &Value, subs: &[Subscript]) -> Result<Value, ScriptError> {
        match base {
            Value::Array(array) => {
                let resolved = self.eval_subscripts(subs)?;
                let view = array.view(&resolved)?;
                let has_ellipsis = resolved.contains(&Sub::Ellipsis);
                if view.ndim() == 0 && !has_ellipsis {
                    Ok(Value::Number(view.to_vec()[0]))
                } else {
                    Ok(Value::Array(view))
                }
            }
            Value::List(items) => {
                let [Subscript::Item(expr)] = subs else {
                    return Err(type_error("lists support a single integer index"));
                };
                let i = as_index(&self.eval(expr)?)?;
                let n = items.len() as i64;
                let k = if i < 0 { i + n } else { i };
                if k < 0 || k >= n {
                    return Err(index_error(format!("list index {i} out of range")));
                }
                Ok(items[k as usize].clone())
            }
            other => Err(type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    fn eval_subscripts(&self, subs: &[Subscript]) -> Result<Vec<Sub>, ScriptError> {
        let mut out = Vec::with_capacity(subs.len());
        for sub in subs {
            match sub {
                Subscript::Ellipsis => out.push(Sub::Ellipsis),
                Subscript::Item(expr) => match self.eval(expr)? {
                    Value::Slices(slices) => out.extend(slices.iter().map(|s| {
                        Sub::Range(Some(s.offset as i64), Some(s.end() as i64))
                    })),
                    other => out.push(Sub::Index(as_index(&other)?)),
                },
                Subscript::Range { start, stop } => {
                    let bound = |e: &Option<Expr>| -> Result<Option<i64>, ScriptError> {
                        match e {
                            Some(e) => Ok(Some(as_index(&self.eval(e)?)?)),
                            None => Ok(None),
                        }
                    };
                    out.push(Sub::Range(bound(start)?, bound(stop)?));
                }
            }
        }
        Ok(out)
    }
}

fn name_error(name: &str) -> ScriptError {
    ScriptError::runtime(ErrorKind::Name, format!("name '{name}' is not defined"))
}

fn as_index(value: &Value) -> Result<i64, ScriptError> {
    match value {
        Value::Number(v) if v.fract() == 0.0 => Ok(*v as i64),
        other => Err(type_error(format!(
            "indices must be integers or slices, not {}",
            other.type_name()
        ))),
    }
}

fn attribute(base: &Value, name: &str) -> Result<Value, ScriptError> {
    match base {
        Value::Record(record) => record.field(name).cloned().ok_or_else(|| {
            ScriptError::runtime(
                ErrorKind::Attribute,
                format!("'{}' record has no field '{name}'", record.ty.name),
            )
        }),
        Value::Array(array) => match name {
            "shape" => Ok(Value::List(Rc::new(
                array.shape().iter().map(|&n| Value::Number(n as f64)).collect(),
            ))),
            "ndim" => Ok(Value::Number(array.ndim() as f64)),
            "size" => Ok(Value::Number(array.len() as f64)),
            _ => Err(ScriptError::runtime(
                ErrorKind::Attribute,
                format!("array has no attribute '{name}'"),
            )),
        },
        other => Err(ScriptError::runtime(
            ErrorKind::Attribute,
            format!("'{}' object has no attribute '{name}'", other.type_name()),
        )),
    }
}

fn construct(
    ty: Rc<RecordType>,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Value, ScriptError> {
    let n = ty.fields.len();
    if args.len() > n {
        return Err(type_error(format!(
            "{}() takes {n} arguments but {} were given",
            ty.name,
            args.len()
        )));
    }
    let mut values: Vec<Option<Value>> = args.into_iter().map(Some).collect();
    values.resize(n, None);
    for (key, value) in kwargs {
        let i = ty.fields.iter().position(|f| *f == key).ok_or_else(|| {
            type_error(format!("{}() got an unexpected keyword argument '{key}'", ty.name))
        })?;
        if values[i].is_some() {
            return Err(type_error(format!(
                "{}() got multiple values for argument '{key}'",
                ty.name
            )));
        }
        values[i] = Some(value);
    }
    let values = values
        .into_iter()
        .zip(&ty.fields)
        .map(|(v, f)| v.ok_or_else(|| type_error(format!("{}() missing argument '{f}'", ty.name))))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Record(Rc::new(Record { ty, values })))
}

// ── Host bindings ──────────────────────────────────────────────────

fn from_binding(name: &str, binding: Binding) -> Result<Value, EngineError> {
    let array = |b: ArrayBinding| {
        ArrayRef::shared(b)
            .map(Value::Array)
            .map_err(|reason| EngineError::Bind {
                name: name.to_string(),
                reason,
            })
    };
    Ok(match binding {
        Binding::Array(b) => array(b)?,
        Binding::Arrays(bs) => Value::List(Rc::new(
            bs.into_iter().map(array).collect::<Result<Vec<_>, _>>()?,
        )),
        Binding::Int(v) => Value::Number(v as f64),
        Binding::Ints(vs) => Value::List(Rc::new(vs.into_iter().map(|v| Value::Number(v as f64)).collect())),
        Binding::Float(v) => Value::Number(v),
        Binding::Slices(s) => Value::Slices(Rc::from(s)),
    })
}

fn array_binding(array: &ArrayRef) -> ArrayBinding {
    array.as_binding().unwrap_or_else(|| {
        let values = array.to_vec();
        let buffer = SharedBuffer::zeroed(values.len() * Primitive::F64.byte_width());
        buffer.write(|bytes| {
            for (i, v) in values.iter().enumerate() {
                Primitive::F64.write(bytes, i, (*v).into());
            }
        });
        ArrayBinding {
            buffer,
            primitive: Primitive::F64,
            shape: array.shape().iter().copied().collect(),
        }
    })
}

fn to_binding(value: &Value) -> Option<Binding> {
    match value {
        Value::Number(v) => Some(Binding::Float(*v)),
        Value::Array(a) => Some(Binding::Array(array_binding(a))),
        Value::Slices(s) => Some(Binding::Slices(s.to_vec())),
        Value::List(items) => {
            if items.iter().all(|v| matches!(v, Value::Number(n) if n.fract() == 0.0)) {
                Some(Binding::Ints(
                    items
                        .iter()
                        .filter_map(|v| match v {
                            Value::Number(n) => Some(*n as i64),
                            _ => None,
                        })
                        .collect(),
                ))
            } else if items.iter().all(|v| matches!(v, Value::Array(_))) {
                Some(Binding::Arrays(
                    items
                        .iter()
                        .filter_map(|v| match v {
                            Value::Array(a) => Some(array_binding(a)),
                            _ => None,
                        })
                        .collect(),
                ))
            } else {
                None
            }
        }
        _ => None,
    }
}

impl ExecutionContext for Interpreter {
    fn exec(&mut self, code: &str) -> Result<(), EngineError> {
        self.run(code).map_err(EngineError::from)
    }

    fn bind(&mut self, name: &str, value: Binding) -> Result<(), EngineError> {
        let value = from_binding(name, value)?;
        self.globals.insert(name.to_string(), value);
        Ok(())
    }

    fn unbind(&mut self, name: &str) {
        self.globals.shift_remove(name);
    }

    fn lookup(&self, name: &str) -> Option<Binding> {
        self.globals.get(name).and_then(to_binding)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.globals.keys().cloned().collect();
        names.sort();
        names
    }
}
