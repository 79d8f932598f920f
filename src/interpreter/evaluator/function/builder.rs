use std::rc::Rc;

use crate::{
    error::RuntimeError,
    interpreter::{
        evaluator::core::{Context, EvalResult},
        value::{
            core::Value,
            geometry::{Matrix4, Placement, Rotation, Vector3},
        },
    },
};

/// Determinants at or below this magnitude make a matrix singular.
const SINGULAR_EPSILON: f64 = f64::EPSILON;

fn number(value: &Value, what: &str, line: usize) -> EvalResult<f64> {
    value.as_real(line)
         .map_err(|_| RuntimeError::type_error(format!("{what} expects numbers, got '{}'", value.type_name()),
                                               line))
}

/// Reads a vector from a vector value or a sequence of three numbers.
fn vector_of(value: &Value, line: usize) -> Option<EvalResult<Vector3>> {
    match value {
        Value::Vector(v) => Some(Ok(*v)),
        other => {
            let items = other.sequence_items()?;
            if items.len() != 3 {
                return None;
            }
            Some(vector_from(&items, line))
        },
    }
}

fn vector_from(items: &[Value], line: usize) -> EvalResult<Vector3> {
    match items {
        [] => Ok(Vector3::default()),
        [x, y, z] => Ok(Vector3::new(number(x, "Vector", line)?,
                                     number(y, "Vector", line)?,
                                     number(z, "Vector", line)?)),
        [single] => vector_of(single, line).unwrap_or_else(|| {
                        Err(RuntimeError::type_error("Vector expects three numbers or a sequence of three numbers",
                                                     line))
                    }),
        _ => Err(RuntimeError::type_error("Vector expects three numbers or a sequence of three numbers",
                                          line)),
    }
}

fn rotation_from(items: &[Value], line: usize) -> EvalResult<Rotation> {
    match items {
        [] => Ok(Rotation::IDENTITY),
        [Value::Rotation(r)] => Ok(*r),
        [axis, angle] => {
            let axis = vector_of(axis, line).unwrap_or_else(|| {
                           Err(RuntimeError::type_error("Rotation expects an axis vector", line))
                       })?;
            Ok(Rotation::from_axis_angle(&axis, number(angle, "Rotation", line)?))
        },
        _ => Err(RuntimeError::type_error("Rotation expects (axis, angle) or a rotation", line)),
    }
}

fn placement_from(items: &[Value], line: usize) -> EvalResult<Placement> {
    match items {
        [] => Ok(Placement::default()),
        [Value::Placement(p)] => Ok(**p),
        [base] => Ok(Placement::new(vector_from(std::slice::from_ref(base), line)?, Rotation::IDENTITY)),
        [base, rotation] => {
            Ok(Placement::new(vector_from(std::slice::from_ref(base), line)?,
                              rotation_from(std::slice::from_ref(rotation), line)?))
        },
        [base, axis, angle] => {
            Ok(Placement::new(vector_from(std::slice::from_ref(base), line)?,
                              rotation_from(&[axis.clone(), angle.clone()], line)?))
        },
        _ => Err(RuntimeError::type_error("Placement expects (base), (base, rotation) or (base, axis, angle)",
                                          line)),
    }
}

fn matrix_from(items: &[Value], line: usize) -> EvalResult<Matrix4> {
    match items {
        [] => Ok(Matrix4::IDENTITY),
        [Value::Matrix(m)] => Ok(**m),
        items if items.len() == 16 => {
            let mut values = [0.0; 16];
            for (slot, item) in values.iter_mut().zip(items) {
                *slot = number(item, "Matrix", line)?;
            }
            Ok(Matrix4::from_values(&values))
        },
        _ => Err(RuntimeError::type_error("Matrix expects 16 numbers", line)),
    }
}

impl Context {
    /// Builds a geometry value: `create(type, args...)`.
    ///
    /// The type name is matched case-insensitively against `vector`,
    /// `matrix`, `rotation` and `placement`; the remaining arguments
    /// initialize the value, which otherwise starts as zero or identity.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// let v = evaluate_source(&mut ctx, "create('Vector', 1, 2, 3).y").unwrap();
    /// assert_eq!(v.to_string(), "2");
    ///
    /// let err = evaluate_source(&mut ctx, "create('shape')").unwrap_err();
    /// assert!(err.to_string().contains("Unknown type 'shape'."));
    /// ```
    pub(crate) fn create(values: &[Value], line: usize) -> EvalResult<Value> {
        let Some((kind, rest)) = values.split_first() else {
            return Err(RuntimeError::runtime("Function requires at least one argument.", line));
        };
        let Some(kind) = kind.as_str() else {
            return Err(RuntimeError::type_error("Function requires the first argument to be a string.",
                                                line));
        };
        match kind.to_ascii_lowercase().as_str() {
            "vector" => Ok(Value::Vector(vector_from(rest, line)?)),
            "matrix" => Ok(Value::Matrix(Rc::new(matrix_from(rest, line)?))),
            "rotation" => Ok(Value::Rotation(rotation_from(rest, line)?)),
            "placement" => Ok(Value::Placement(Rc::new(placement_from(rest, line)?))),
            _ => Err(RuntimeError::type_error(format!("Unknown type '{kind}'."), line)),
        }
    }

    /// Scales a matrix: `mscale(matrix, vector)` or
    /// `mscale(matrix, x, y, z)`.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// let src = "m = mscale(create('matrix'), 2, 3, 4)\nm * create('vector', 1, 1, 1)";
    /// assert_eq!(evaluate_source(&mut ctx, src).unwrap().to_string(), "Vector (2, 3, 4)");
    /// ```
    pub(crate) fn mscale(values: &[Value], line: usize) -> EvalResult<Value> {
        let invalid = || {
            RuntimeError::type_error("Function requires arguments to be either (matrix,vector) or \
                                      (matrix,number,number,number).",
                                     line)
        };
        let Some((Value::Matrix(matrix), rest)) = values.split_first() else {
            return Err(invalid());
        };
        let scale = match rest {
            [v] => vector_of(v, line).ok_or_else(invalid)??,
            [x, y, z] if x.is_numeric() && y.is_numeric() && z.is_numeric() => {
                Vector3::new(x.as_real(line)?, y.as_real(line)?, z.as_real(line)?)
            },
            _ => return Err(invalid()),
        };
        Ok(Value::Matrix(Rc::new(matrix.scaled(&scale))))
    }

    /// Inverts a matrix, placement or rotation.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// let src = "p = create('placement', create('vector', 1, 2, 3))\nminvert(p) * p == create('placement')";
    /// assert_eq!(evaluate_source(&mut ctx, src).unwrap().to_string(), "True");
    ///
    /// let err = evaluate_source(&mut ctx, "minvert(mscale(create('matrix'), 0, 1, 1))").unwrap_err();
    /// assert!(err.to_string().contains("Cannot invert singular matrix."));
    /// ```
    pub(crate) fn minvert(value: &Value, line: usize) -> EvalResult<Value> {
        match value {
            Value::Matrix(m) => {
                m.inverse()
                 .filter(|_| m.determinant().abs() > SINGULAR_EPSILON)
                 .map(|inv| Value::Matrix(Rc::new(inv)))
                 .ok_or_else(|| RuntimeError::runtime("Cannot invert singular matrix.", line))
            },
            Value::Placement(p) => Ok(Value::Placement(Rc::new(p.inverse()))),
            Value::Rotation(r) => Ok(Value::Rotation(r.inverse())),
            _ => Err(RuntimeError::type_error("Function requires the first argument to be either Matrix, \
                                               Placement or Rotation.",
                                              line)),
        }
    }
}
