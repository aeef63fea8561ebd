//! Fireball input parameters as `&NAME ... &END` namelists

use std::{
    collections::BTreeMap, error::Error, fmt::Display, str::FromStr,
};

use serde::{Deserialize, Serialize};

/// a scalar namelist value, rendered in Fortran literal form
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
}

/// format `v` the way Fortran writes a double: width 18, 10 decimals, `d`
/// exponent
pub fn fortran_float(v: f64) -> String {
    let s = format!("{v:.10e}");
    let (mantissa, exp) = s.split_once('e').unwrap();
    let exp: i32 = exp.parse().unwrap();
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{:>18}", format!("{mantissa}d{sign}{:02}", exp.abs()))
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(true) => write!(f, ".true."),
            Value::Bool(false) => write!(f, ".false."),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{}", fortran_float(*r)),
            Value::Str(s) => write!(f, "'{s}'"),
        }
    }
}

impl FromStr for Value {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == ".true." {
            return Ok(Value::Bool(true));
        }
        if s == ".false." {
            return Ok(Value::Bool(false));
        }
        if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
            return Ok(Value::Str(s[1..s.len() - 1].to_string()));
        }
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Value::Int(i));
        }
        if let Ok(r) = s.replace(['d', 'D'], "e").parse::<f64>() {
            return Ok(Value::Real(r));
        }
        Err(ParamError::Parse(s.to_string()))
    }
}

pub type Namelist = BTreeMap<String, Value>;

#[derive(Debug, PartialEq, Eq)]
pub enum ParamError {
    /// a user-supplied key collides with one the deck builder owns
    Blocked { namelist: String, key: String },
    Parse(String),
}

impl Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamError::Blocked { namelist, key } => write!(
                f,
                "cannot specify the '{key}' keyword in the '{namelist}' \
                 namelist"
            ),
            ParamError::Parse(s) => {
                write!(f, "failed to parse namelist value '{s}'")
            }
        }
    }
}

impl Error for ParamError {}

/// the full parameter set: namelist name → key → value. namelist names are
/// stored uppercase and keys lowercase, both written in sorted order
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Namelists(pub BTreeMap<String, Namelist>);

impl Namelists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        namelist: &str,
        key: &str,
        value: Value,
    ) -> Option<Value> {
        self.0
            .entry(namelist.to_uppercase())
            .or_default()
            .insert(key.to_lowercase(), value)
    }

    pub fn get(&self, namelist: &str, key: &str) -> Option<&Value> {
        self.0.get(&namelist.to_uppercase())?.get(&key.to_lowercase())
    }

    pub fn entry(&mut self, namelist: &str) -> &mut Namelist {
        self.0.entry(namelist.to_uppercase()).or_default()
    }

    /// fold `blocked` into a copy of `self`. a user-supplied value for a
    /// blocked key is an error
    pub fn merged(&self, blocked: &Namelists) -> Result<Self, ParamError> {
        let mut ret = self.clone();
        for (name, namelist) in &blocked.0 {
            for (key, value) in namelist {
                if ret.get(name, key).is_some() {
                    return Err(ParamError::Blocked {
                        namelist: name.clone(),
                        key: key.clone(),
                    });
                }
                ret.insert(name, key, value.clone());
            }
        }
        Ok(ret)
    }

    pub fn render(&self) -> String {
        use std::fmt::Write;
        let mut ret = String::new();
        for (name, namelist) in &self.0 {
            writeln!(ret, "&{name}").unwrap();
            for (key, value) in namelist {
                writeln!(ret, "  {key} = {value}").unwrap();
            }
            writeln!(ret, "&END").unwrap();
        }
        ret
    }
}

impl FromStr for Namelists {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ret = Namelists::new();
        let mut current = None;
        for line in s.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.eq_ignore_ascii_case("&END") {
                current = None;
            } else if let Some(name) = line.strip_prefix('&') {
                current = Some(name.to_uppercase());
            } else if let Some((key, value)) = line.split_once('=') {
                let Some(name) = &current else {
                    return Err(ParamError::Parse(line.to_string()));
                };
                ret.insert(name, key.trim(), value.parse()?);
            } else {
                return Err(ParamError::Parse(line.to_string()));
            }
        }
        Ok(ret)
    }
}
