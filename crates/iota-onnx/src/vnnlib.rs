//! VNNLIB robustness properties.
//!
//! Reads the input box from `(assert (>= X_i lo))` / `(assert (<= X_i hi))`
//! constraints and the expected label from the caller, from the file name
//! (`..._<label>.vnnlib`) or from the output disjunction
//! `(assert (or (and (>= Y_j Y_label)) ...))`. Only asserts before the first
//! `or` contribute input bounds.

use crate::io;
use iota_core::{IotaError, Result};
use iota_propagate::RobustnessProperty;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

impl Sexp {
    fn atom(&self) -> Option<&str> {
        match self {
            Sexp::Atom(s) => Some(s),
            Sexp::List(_) => None,
        }
    }

    /// Head symbol and arguments of a list form.
    fn call(&self) -> Option<(&str, &[Sexp])> {
        match self {
            Sexp::List(items) => {
                let (head, args) = items.split_first()?;
                Some((head.atom()?, args))
            }
            Sexp::Atom(_) => None,
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for line in text.lines() {
        let code = line.split(';').next().unwrap_or("");
        let mut current = String::new();
        for c in code.chars() {
            match c {
                '(' | ')' => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                    tokens.push(c.to_string());
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }
    }
    tokens
}

fn parse_forms(text: &str) -> Result<Vec<Sexp>> {
    let mut stack: Vec<Vec<Sexp>> = vec![Vec::new()];
    for token in tokenize(text) {
        match token.as_str() {
            "(" => stack.push(Vec::new()),
            ")" => {
                let list = stack
                    .pop()
                    .filter(|_| !stack.is_empty())
                    .ok_or_else(|| IotaError::InvalidSpec("unbalanced ')'".to_string()))?;
                if let Some(parent) = stack.last_mut() {
                    parent.push(Sexp::List(list));
                }
            }
            _ => {
                if let Some(top) = stack.last_mut() {
                    top.push(Sexp::Atom(token));
                }
            }
        }
    }
    match stack.pop() {
        Some(forms) if stack.is_empty() => Ok(forms),
        _ => Err(IotaError::InvalidSpec("unbalanced '('".to_string())),
    }
}

/// Index of a variable named `<prefix>_<i>` or `<prefix><i>`.
fn var_index(name: &str, prefix: char) -> Option<usize> {
    let rest = name.strip_prefix(prefix)?;
    let digits = rest.strip_prefix('_').unwrap_or(rest);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_number(token: &Sexp) -> Result<f64> {
    let text = token
        .atom()
        .ok_or_else(|| IotaError::InvalidSpec(format!("expected a number, got {token:?}")))?;
    let value: f64 = text
        .parse()
        .map_err(|_| IotaError::InvalidSpec(format!("invalid number '{text}'")))?;
    if !value.is_finite() {
        return Err(IotaError::InvalidSpec(format!("non-finite bound '{text}'")));
    }
    Ok(value)
}

#[derive(Debug, Default)]
struct BoxBuilder {
    lower: BTreeMap<usize, f64>,
    upper: BTreeMap<usize, f64>,
    declared_inputs: usize,
}

impl BoxBuilder {
    fn set(&mut self, index: usize, value: f64, is_lower: bool) -> Result<()> {
        let (map, kind) = if is_lower {
            (&mut self.lower, "lower")
        } else {
            (&mut self.upper, "upper")
        };
        if map.insert(index, value).is_some() {
            return Err(IotaError::InvalidSpec(format!(
                "duplicate {kind} bound for X_{index}"
            )));
        }
        Ok(())
    }

    /// Record an input bound from `(op lhs rhs)`. Other forms are ignored.
    fn constraint(&mut self, op: &str, args: &[Sexp]) -> Result<()> {
        let [lhs, rhs] = args else {
            return Ok(());
        };
        let is_ge = match op {
            ">=" => true,
            "<=" => false,
            _ => return Ok(()),
        };
        if let Some(i) = lhs.atom().and_then(|s| var_index(s, 'X')) {
            self.set(i, parse_number(rhs)?, is_ge)
        } else if let Some(i) = rhs.atom().and_then(|s| var_index(s, 'X')) {
            // (<= lo X_i) bounds from below, (>= hi X_i) from above.
            self.set(i, parse_number(lhs)?, !is_ge)
        } else {
            Ok(())
        }
    }

    fn collect(&mut self, form: &Sexp) -> Result<()> {
        let Some((op, args)) = form.call() else {
            return Ok(());
        };
        if op == "and" {
            for arg in args {
                self.collect(arg)?;
            }
            return Ok(());
        }
        self.constraint(op, args)
    }

    fn finish(self) -> Result<(Vec<f64>, Vec<f64>)> {
        let dim = [
            self.declared_inputs,
            self.lower.keys().next_back().map_or(0, |i| i + 1),
            self.upper.keys().next_back().map_or(0, |i| i + 1),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        if dim == 0 {
            return Err(IotaError::InvalidSpec(
                "property has no input bounds".to_string(),
            ));
        }

        let mut lower = Vec::with_capacity(dim);
        let mut upper = Vec::with_capacity(dim);
        for index in 0..dim {
            let lo = *self.lower.get(&index).ok_or_else(|| {
                IotaError::InvalidSpec(format!("missing lower bound for X_{index}"))
            })?;
            let hi = *self.upper.get(&index).ok_or_else(|| {
                IotaError::InvalidSpec(format!("missing upper bound for X_{index}"))
            })?;
            if lo > hi {
                return Err(IotaError::InvalidBox {
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
            lower.push(lo);
            upper.push(hi);
        }
        Ok((lower, upper))
    }
}

/// Label `l` of an output comparison `Y_j >= Y_l` (either orientation).
fn label_of_comparison(op: &str, args: &[Sexp]) -> Option<usize> {
    let [lhs, rhs] = args else {
        return None;
    };
    let l = lhs.atom().and_then(|s| var_index(s, 'Y'))?;
    let r = rhs.atom().and_then(|s| var_index(s, 'Y'))?;
    match op {
        ">=" | ">" => Some(r),
        "<=" | "<" => Some(l),
        _ => None,
    }
}

fn collect_output_labels(form: &Sexp, labels: &mut Vec<usize>) {
    let Some((op, args)) = form.call() else {
        return;
    };
    match op {
        "or" | "and" => {
            for arg in args {
                collect_output_labels(arg, labels);
            }
        }
        _ => labels.extend(label_of_comparison(op, args)),
    }
}

/// Label encoded in the file name as `<anything>_<label>.vnnlib`.
pub fn label_from_file_name(path: &Path) -> Option<usize> {
    let name = io::logical_file_name(path)?;
    let stem = name.strip_suffix(".vnnlib").unwrap_or(name);
    stem.rsplit('_').next()?.parse().ok()
}

/// Parse property text. `label` takes precedence over the output clause.
pub fn parse_vnnlib(text: &str, label: Option<usize>) -> Result<RobustnessProperty> {
    let forms = parse_forms(text)?;
    let mut bounds = BoxBuilder::default();
    let mut output_labels = Vec::new();
    let mut reached_output = false;

    for form in &forms {
        let Some((head, args)) = form.call() else {
            continue;
        };
        match head {
            "declare-const" => {
                let declared = args
                    .first()
                    .and_then(Sexp::atom)
                    .and_then(|s| var_index(s, 'X'));
                if let Some(i) = declared {
                    bounds.declared_inputs = bounds.declared_inputs.max(i + 1);
                }
            }
            "assert" => {
                let Some(body) = args.first() else {
                    continue;
                };
                match body.call() {
                    Some(("or", _)) => {
                        reached_output = true;
                        collect_output_labels(body, &mut output_labels);
                    }
                    Some((op, inner)) if !reached_output => {
                        if op != "and" && label_of_comparison(op, inner).is_some() {
                            collect_output_labels(body, &mut output_labels);
                        } else {
                            bounds.collect(body)?;
                        }
                    }
                    _ => collect_output_labels(body, &mut output_labels),
                }
            }
            _ => {}
        }
    }

    let (input_lower, input_upper) = bounds.finish()?;
    let label = match label {
        Some(label) => label,
        None => infer_label(&output_labels)?,
    };
    debug!(
        "Parsed VNNLIB property: {} inputs, label {}",
        input_lower.len(),
        label
    );
    Ok(RobustnessProperty::new(input_lower, input_upper, label))
}

fn infer_label(candidates: &[usize]) -> Result<usize> {
    let Some((&first, rest)) = candidates.split_first() else {
        return Err(IotaError::InvalidSpec(
            "cannot determine the label: pass it explicitly or name the file <name>_<label>.vnnlib"
                .to_string(),
        ));
    };
    if let Some(other) = rest.iter().find(|&&l| l != first) {
        return Err(IotaError::InvalidSpec(format!(
            "output clause mentions conflicting labels {first} and {other}"
        )));
    }
    Ok(first)
}

/// Read a property file (`.vnnlib` or `.vnnlib.gz`).
///
/// The label comes from `label`, else the file name suffix, else the output
/// disjunction.
pub fn read_vnnlib<P: AsRef<Path>>(path: P, label: Option<usize>) -> Result<RobustnessProperty> {
    let path = path.as_ref();
    info!("Reading VNNLIB property from: {}", path.display());
    let text = io::read_text(path).map_err(|e| match e {
        IotaError::ModelLoad(msg) => IotaError::InvalidSpec(msg),
        other => other,
    })?;
    parse_vnnlib(&text, label.or_else(|| label_from_file_name(path)))
}
