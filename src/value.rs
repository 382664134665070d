use std::fmt;

/// The scalar runtime datum. Equality compares the raw 32-bit pattern, so
/// `Int(0)` and `Float(0.0)` are equal while `Float(-0.0)` is not.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    Int(i32),
    Float(f32),
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Value {}

impl Value {
    pub fn bits(&self) -> u32 {
        match self {
            Value::Int(n) => *n as u32,
            Value::Float(f) => f.to_bits(),
        }
    }

    pub fn as_int(&self) -> i32 {
        match self {
            Value::Int(n) => *n,
            Value::Float(f) => *f as i32,
        }
    }

    pub fn as_float(&self) -> f32 {
        match self {
            Value::Int(n) => *n as f32,
            Value::Float(f) => *f,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
        }
    }

    pub fn from_bool(b: bool) -> Self {
        Value::Int(b as i32)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
        }
    }
}
