use crate::error::AppError;

/// Control keys consumed by sorting, projection and pagination. They never
/// become filter constraints.
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Comparison operator attached to a filter key, e.g. `price[gte]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            _ => None,
        }
    }
}

/// Raw query-string parameters in arrival order.
///
/// Repeated keys are kept; single-valued controls (`page`, `sort`, ...) take
/// the last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            pairs: pairs.into_iter().collect(),
        }
    }

    /// Last value supplied for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces every value of `key` with `value`.
    pub fn set(&mut self, key: &str, value: &str) {
        self.pairs.retain(|(k, _)| k != key);
        self.pairs.push((key.to_string(), value.to_string()));
    }

    /// Non-reserved pairs, i.e. the filter candidates.
    pub fn filter_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Splits `price[gte]` into `("price", Gte)`; a bare key is equality.
pub fn split_operator(key: &str) -> Result<(&str, FilterOp), AppError> {
    let Some(open) = key.find('[') else {
        return Ok((key, FilterOp::Eq));
    };

    let field = &key[..open];
    let tag = key[open + 1..]
        .strip_suffix(']')
        .ok_or_else(|| AppError::Cast(format!("Malformed filter key: {}", key)))?;
    let op = FilterOp::from_tag(tag)
        .ok_or_else(|| AppError::Cast(format!("Unsupported filter operator: {}", tag)))?;

    Ok((field, op))
}
