// Path query evaluation - thin adapter over the serde_json_path engine

use crate::error::Result;
use serde_json::Value;
use serde_json_path::JsonPath;

/// The expression that selects the entire data set.
pub const DEFAULT_QUERY: &str = "$";

/// Evaluate a JSONPath expression against a root value, returning every
/// match as a flat ordered list. The caller chooses the root (whole cache
/// or a single table); this module only forwards the expression.
pub fn eval(root: &Value, expr: &str) -> Result<Vec<Value>> {
    let path = JsonPath::parse(expr)?;
    Ok(path.query(root).all().into_iter().cloned().collect())
}
