//! 从字段名不稳定的响应中按固定优先级提取值。

use serde_json::Value;

/// 按顺序尝试的字段访问器。
#[derive(Debug, Clone, Copy)]
pub struct FieldAccessor {
    pub name: &'static str,
}

impl FieldAccessor {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        value.get(self.name).filter(|field| !field.is_null())
    }
}

pub const TX_ID_FIELDS: &[FieldAccessor] = &[
    FieldAccessor::new("txId"),
    FieldAccessor::new("txid"),
    FieldAccessor::new("txID"),
    FieldAccessor::new("transactionId"),
    FieldAccessor::new("transaction_id"),
];

pub const CONFIRMED_ROUND_FIELDS: &[FieldAccessor] = &[
    FieldAccessor::new("confirmed-round"),
    FieldAccessor::new("confirmedRound"),
    FieldAccessor::new("round"),
];

/// 返回第一个存在且可转换的值。
pub fn first_present<T>(
    value: &Value,
    accessors: &[FieldAccessor],
    convert: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    accessors
        .iter()
        .filter_map(|accessor| accessor.get(value))
        .find_map(convert)
}

pub fn extract_transaction_id(value: &Value) -> Option<String> {
    first_present(value, TX_ID_FIELDS, |field| {
        field
            .as_str()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    })
}

pub fn extract_confirmed_round(value: &Value) -> Option<u64> {
    first_present(value, CONFIRMED_ROUND_FIELDS, |field| match field {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}
