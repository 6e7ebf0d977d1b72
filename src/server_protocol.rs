use serde_json::Value;

use crate::grid::validate_counts;

#[derive(Debug)]
pub enum ParsedClientMessage {
    Start {
        seed: Option<i64>,
        game_speed: Option<i64>,
        tick_ms: Option<i64>,
        counts: Option<Vec<Vec<u32>>>,
    },
    Stop,
    Ping {
        t: f64,
    },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "start" => {
            let seed = parse_optional_i64(object.get("seed"))?;
            let game_speed = parse_optional_i64(object.get("gameSpeed"))?;
            let tick_ms = parse_optional_i64(object.get("tickMs"))?;
            let counts = match object.get("counts") {
                None | Some(Value::Null) => None,
                Some(value) => Some(parse_counts(value)?),
            };
            Some(ParsedClientMessage::Start {
                seed,
                game_speed,
                tick_ms,
                counts,
            })
        }
        "stop" => Some(ParsedClientMessage::Stop),
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_counts(value: &Value) -> Option<Vec<Vec<u32>>> {
    let counts: Vec<Vec<u32>> = serde_json::from_value(value.clone()).ok()?;
    validate_counts(&counts).ok()?;
    Some(counts)
}

fn parse_optional_i64(value: Option<&Value>) -> Option<Option<i64>> {
    const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

    let Some(value) = value else {
        return Some(None);
    };
    if let Some(number) = value.as_i64() {
        return Some(Some(number));
    }
    if let Some(number) = value.as_u64() {
        return i64::try_from(number).ok().map(Some);
    }
    if let Some(number) = value.as_f64() {
        if number.is_finite() {
            let floored = number.floor();
            if floored.abs() > MAX_SAFE_INTEGER_F64 {
                return None;
            }
            return Some(Some(floored as i64));
        }
    }
    None
}
