//! 聚合器响应里的数值字段可能是 JSON 数字，也可能是数字字符串。

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Number, Value};

pub(crate) fn decimal_from_number(number: &Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

pub(crate) fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => decimal_from_number(number),
        Value::String(text) => {
            let trimmed = text.trim();
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .ok()
        }
        _ => None,
    }
}

pub mod option_decimal_from_number_or_string {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, de};
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => super::decimal_from_value(&value)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("decimal parse error: {value}"))),
        }
    }
}

/// 基础单位数量：非负整数，允许数字字符串或小数部分为零的数字。
pub mod option_base_units {
    use rust_decimal::Decimal;
    use rust_decimal::prelude::ToPrimitive;
    use serde::{Deserialize, Deserializer, de};
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(text)) if text.trim().is_empty() => return Ok(None),
            Some(value) => value,
        };
        if let Some(units) = value.as_u64() {
            return Ok(Some(units));
        }
        let decimal = super::decimal_from_value(&value)
            .ok_or_else(|| de::Error::custom(format!("amount parse error: {value}")))?;
        if decimal.is_sign_negative() || decimal.fract() != Decimal::ZERO {
            return Err(de::Error::custom(format!(
                "amount must be a non-negative integer: {value}"
            )));
        }
        decimal
            .to_u64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("amount out of range: {value}")))
    }
}
