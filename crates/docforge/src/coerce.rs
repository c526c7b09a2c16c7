//! Best-effort conversion of loosely-typed payloads into model types
//!
//! A payload is run through an ordered list of strategies and the first one
//! that yields a value wins. Failures are never surfaced to the caller: when
//! every strategy misses, the model's fallback value is used, and when the
//! model has none the original payload is handed back untouched.

use std::any::Any;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::model::Model;

/// A value that already has a concrete Rust type
pub trait TypedPayload: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    /// Serialize generically, used when the payload is not the target type
    fn to_json(&self) -> serde_json::Result<Value>;

    fn type_name(&self) -> &'static str;
}

impl<T> TypedPayload for T
where
    T: Serialize + Any + Send + Sync + fmt::Debug,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Untyped data supplied by a caller for one generation request
#[derive(Debug)]
pub enum RawPayload {
    /// JSON text
    Text(String),
    /// An already parsed JSON tree
    Json(Value),
    /// Raw bytes of a JSON (or YAML) document
    Document(Vec<u8>),
    /// A pre-typed Rust value
    Typed(Box<dyn TypedPayload>),
}

impl RawPayload {
    pub fn typed<T: TypedPayload>(value: T) -> Self {
        RawPayload::Typed(Box::new(value))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RawPayload::Text(_) => "text",
            RawPayload::Json(_) => "json",
            RawPayload::Document(_) => "document",
            RawPayload::Typed(_) => "typed",
        }
    }

    /// Best-effort JSON view of the payload, used when no model applies.
    ///
    /// Text and documents that do not parse are kept as plain strings.
    pub fn to_json(&self) -> Value {
        match self {
            RawPayload::Text(text) => {
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
            }
            RawPayload::Json(value) => value.clone(),
            RawPayload::Document(bytes) => serde_json::from_slice(strip_bom(bytes))
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
            RawPayload::Typed(value) => value.as_ref().to_json().unwrap_or(Value::Null),
        }
    }
}

impl From<Value> for RawPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => RawPayload::Text(text),
            other => RawPayload::Json(other),
        }
    }
}

impl From<String> for RawPayload {
    fn from(text: String) -> Self {
        RawPayload::Text(text)
    }
}

impl From<&str> for RawPayload {
    fn from(text: &str) -> Self {
        RawPayload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for RawPayload {
    fn from(bytes: Vec<u8>) -> Self {
        RawPayload::Document(bytes)
    }
}

/// The coercion strategies, in the order they are attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Payload already is the target type
    Identity,
    /// Parse JSON text
    JsonText,
    /// Deserialize a parsed JSON tree
    JsonTree,
    /// Decode raw document bytes with serde_json, then serde_yaml
    JsonDocument,
    /// Serialize generically and deserialize into the target
    Generic,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Identity => "identity",
            Strategy::JsonText => "json-text",
            Strategy::JsonTree => "json-tree",
            Strategy::JsonDocument => "json-document",
            Strategy::Generic => "generic",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type StrategyFn<T> = fn(&RawPayload) -> Option<T>;

/// Result of coercing a payload into `T`
#[derive(Debug)]
pub enum Coerced<T> {
    /// A strategy produced the value
    Model { value: T, strategy: Strategy },
    /// Every strategy missed and the model's fallback was used
    Defaulted(T),
    /// Every strategy missed and the model has no fallback
    Original(RawPayload),
}

impl<T> Coerced<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Coerced::Model { value, .. } | Coerced::Defaulted(value) => Some(value),
            Coerced::Original(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Coerced::Model { value, .. } | Coerced::Defaulted(value) => Some(value),
            Coerced::Original(_) => None,
        }
    }

    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            Coerced::Model { strategy, .. } => Some(*strategy),
            _ => None,
        }
    }
}

impl<T: Model> Coerced<T> {
    /// Erase the model type, keeping a JSON view for rendering
    pub fn into_model(self) -> CoercedModel {
        let serialize = |value: &T| {
            serde_json::to_value(value).unwrap_or_else(|e| {
                warn!(model = T::NAME, error = %e, "coerced model could not be serialized");
                Value::Null
            })
        };

        match self {
            Coerced::Model { value, strategy } => CoercedModel {
                model: Some(T::NAME),
                value: serialize(&value),
                resolution: Resolution::Strategy(strategy),
            },
            Coerced::Defaulted(value) => CoercedModel {
                model: Some(T::NAME),
                value: serialize(&value),
                resolution: Resolution::Defaulted,
            },
            Coerced::Original(raw) => CoercedModel {
                model: Some(T::NAME),
                value: raw.to_json(),
                resolution: Resolution::Uncoerced,
            },
        }
    }
}

/// How a [`CoercedModel`] was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Strategy(Strategy),
    Defaulted,
    Uncoerced,
}

/// Type-erased coercion result handed to the template engine
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedModel {
    /// Name of the model type, `None` when no model was bound
    pub model: Option<&'static str>,
    pub value: Value,
    pub resolution: Resolution,
}

impl CoercedModel {
    /// Wrap a payload that has no model bound to it
    pub fn raw(payload: RawPayload) -> Self {
        Self {
            model: None,
            value: payload.to_json(),
            resolution: Resolution::Uncoerced,
        }
    }
}

/// Ordered list of strategies with a first-success-wins combinator
pub struct Coercer<T> {
    strategies: Vec<(Strategy, StrategyFn<T>)>,
}

impl<T: Model> Coercer<T> {
    pub fn new() -> Self {
        Self {
            strategies: vec![
                (Strategy::Identity, identity::<T>),
                (Strategy::JsonText, json_text::<T>),
                (Strategy::JsonTree, json_tree::<T>),
                (Strategy::JsonDocument, json_document::<T>),
                (Strategy::Generic, generic::<T>),
            ],
        }
    }

    pub fn strategies(&self) -> impl Iterator<Item = Strategy> + '_ {
        self.strategies.iter().map(|(strategy, _)| *strategy)
    }

    pub fn coerce(&self, raw: RawPayload) -> Coerced<T> {
        let found = self.strategies.iter().find_map(|(strategy, attempt)| {
            let value = attempt(&raw)?;
            Some((*strategy, value))
        });

        if let Some((strategy, value)) = found {
            debug!(model = T::NAME, %strategy, payload = raw.kind(), "payload coerced");
            return Coerced::Model { value, strategy };
        }

        match T::fallback() {
            Some(value) => {
                debug!(model = T::NAME, payload = raw.kind(), "no strategy matched, using fallback");
                Coerced::Defaulted(value)
            }
            None => {
                debug!(model = T::NAME, payload = raw.kind(), "no strategy matched, keeping payload");
                Coerced::Original(raw)
            }
        }
    }
}

impl<T: Model> Default for Coercer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Coerce `raw` into `T` with the standard strategy chain
pub fn coerce<T: Model>(raw: RawPayload) -> Coerced<T> {
    Coercer::<T>::new().coerce(raw)
}

fn identity<T: Model>(raw: &RawPayload) -> Option<T> {
    match raw {
        RawPayload::Typed(value) => value.as_ref().as_any().downcast_ref::<T>().cloned(),
        _ => None,
    }
}

fn json_text<T: Model>(raw: &RawPayload) -> Option<T> {
    let RawPayload::Text(text) = raw else {
        return None;
    };
    let value = serde_json::from_str::<Value>(text)
        .map_err(|e| debug!(model = T::NAME, error = %e, "payload text is not JSON"))
        .ok()?;
    from_aligned(value)
}

fn json_tree<T: Model>(raw: &RawPayload) -> Option<T> {
    match raw {
        RawPayload::Json(Value::Null) => None,
        RawPayload::Json(value) => from_aligned(value.clone()),
        _ => None,
    }
}

fn json_document<T: Model>(raw: &RawPayload) -> Option<T> {
    let RawPayload::Document(bytes) = raw else {
        return None;
    };
    let bytes = strip_bom(bytes);

    let via_json = serde_json::from_slice::<Value>(bytes)
        .map_err(|e| debug!(model = T::NAME, error = %e, "document rejected by serde_json"))
        .ok()
        .and_then(from_aligned::<T>);

    via_json.or_else(|| {
        serde_yaml::from_slice::<Value>(bytes)
            .map_err(|e| debug!(model = T::NAME, error = %e, "document rejected by serde_yaml"))
            .ok()
            .and_then(from_aligned::<T>)
    })
}

fn generic<T: Model>(raw: &RawPayload) -> Option<T> {
    match raw.to_json() {
        Value::Null => None,
        value => from_aligned(value),
    }
}

/// Alignment passes; each one reaches one collection level deeper
const ALIGN_PASSES: usize = 4;

fn from_aligned<T: Model>(value: Value) -> Option<T> {
    let defaults = serde_json::to_value(T::default()).unwrap_or(Value::Null);
    let mut aligned = align_keys(value, &defaults);
    let mut parsed = from_value_tolerant::<T>(&aligned, &defaults)?;

    // Collections and optional members are empty in the defaults, so the
    // parsed value supplies the shape of their contents for the next pass
    for _ in 1..ALIGN_PASSES {
        let Ok(shape) = serde_json::to_value(&parsed) else {
            break;
        };
        let realigned = align_keys(aligned.clone(), &shape);
        if realigned == aligned {
            break;
        }
        match from_value_tolerant::<T>(&realigned, &defaults) {
            Some(next) => parsed = next,
            None => break,
        }
        aligned = realigned;
    }
    Some(parsed)
}

/// Deserialize `value`, keeping the default for every member that does not fit
fn from_value_tolerant<T: Model>(value: &Value, defaults: &Value) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => return Some(parsed),
        Err(e) => debug!(model = T::NAME, error = %e, "payload does not fit model as a whole"),
    }
    if !(value.is_object() && defaults.is_object()) {
        return None;
    }

    let mut merged = defaults.clone();
    merge_members::<T>(&mut merged, value, &mut Vec::new());
    serde_json::from_value(merged)
        .map_err(|e| debug!(model = T::NAME, error = %e, "payload does not fit model"))
        .ok()
}

fn merge_members<T: Model>(merged: &mut Value, incoming: &Value, path: &mut Vec<String>) {
    let Value::Object(members) = incoming else {
        return;
    };
    for (key, value) in members {
        path.push(key.clone());
        merge_member::<T>(merged, value, path);
        path.pop();
    }
}

fn merge_member<T: Model>(merged: &mut Value, value: &Value, path: &mut Vec<String>) {
    let candidates = std::iter::once(value.clone()).chain(lenient_scalar(value));
    for candidate in candidates {
        if try_set::<T>(merged, path, candidate) {
            return;
        }
    }

    match value {
        Value::Object(_) => {
            let has_object = matches!(merged.pointer(&pointer(path)), Some(Value::Object(_)));
            if has_object || try_set::<T>(merged, path, Value::Object(Map::new())) {
                merge_members::<T>(merged, value, path);
                return;
            }
        }
        Value::Array(elements) => {
            if try_set::<T>(merged, path, Value::Array(Vec::new())) {
                for element in elements {
                    let index = merged
                        .pointer(&pointer(path))
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len);
                    path.push(index.to_string());
                    merge_member::<T>(merged, element, path);
                    path.pop();
                }
                return;
            }
        }
        _ => {}
    }
    debug!(model = T::NAME, member = %pointer(path), "member does not fit model, keeping default");
}

/// Set `path` to `value` only if the document still deserializes into `T`
fn try_set<T: Model>(merged: &mut Value, path: &[String], value: Value) -> bool {
    let mut candidate = merged.clone();
    if set_at(&mut candidate, path, value).is_none() {
        return false;
    }
    if serde_json::from_value::<T>(candidate.clone()).is_err() {
        return false;
    }
    *merged = candidate;
    true
}

/// Array segments equal to the array length append
fn set_at(root: &mut Value, path: &[String], value: Value) -> Option<()> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Some(());
    };

    let mut node = root;
    for segment in parents {
        node = match node {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    match node {
        Value::Object(map) => {
            map.insert(last.clone(), value);
        }
        Value::Array(items) => {
            let index = last.parse::<usize>().ok()?;
            if index < items.len() {
                items[index] = value;
            } else if index == items.len() {
                items.push(value);
            } else {
                return None;
            }
        }
        _ => return None,
    }
    Some(())
}

fn pointer(path: &[String]) -> String {
    path.iter()
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}

/// Numbers and booleans sent as strings
fn lenient_scalar(value: &Value) -> Option<Value> {
    let Value::String(text) = value else {
        return None;
    };
    let text = text.trim();
    if let Ok(number) = text.parse::<i64>() {
        return Some(Value::from(number));
    }
    if let Ok(number) = text.parse::<f64>() {
        return serde_json::Number::from_f64(number).map(Value::Number);
    }
    text.parse::<bool>().ok().map(Value::Bool)
}

/// Rename object keys to the model's spelling, ignoring case and `_`/`-`
fn align_keys(value: Value, shape: &Value) -> Value {
    match (value, shape) {
        (Value::Object(map), Value::Object(shape)) => {
            let mut aligned = Map::with_capacity(map.len());
            for (key, value) in map {
                let target = if shape.contains_key(&key) {
                    Some(key.clone())
                } else {
                    shape.keys().find(|candidate| same_key(candidate, &key)).cloned()
                };
                match target {
                    Some(target) => {
                        let nested = align_keys(value, &shape[&target]);
                        aligned.insert(target, nested);
                    }
                    None => {
                        aligned.insert(key, value);
                    }
                }
            }
            Value::Object(aligned)
        }
        (Value::Array(items), Value::Array(shape)) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| match shape.get(index).or_else(|| shape.first()) {
                    Some(element) => align_keys(item, element),
                    None => item,
                })
                .collect(),
        ),
        (value, _) => value,
    }
}

fn same_key(a: &str, b: &str) -> bool {
    let normalize = |s: &str| {
        s.chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect::<String>()
    };
    normalize(a) == normalize(b)
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{InvoiceInstance, LineItem};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    struct Address {
        street_name: String,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Order {
        customer_name: String,
        amount: f64,
        #[serde(default)]
        address: Address,
    }

    impl Model for Order {
        const NAME: &'static str = "Order";
        const NAMESPACE: &'static str = "Shop";
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Strict {
        id: u32,
    }

    impl Model for Strict {
        const NAME: &'static str = "Strict";
        const NAMESPACE: &'static str = "";

        fn fallback() -> Option<Self> {
            None
        }
    }

    #[derive(Debug, Serialize)]
    struct LegacyOrder {
        #[serde(rename = "CUSTOMER_NAME")]
        customer: String,
        amount: f64,
    }

    fn order() -> Order {
        Order {
            customer_name: "John Doe".to_string(),
            amount: 100.0,
            address: Address::default(),
        }
    }

    #[test]
    fn typed_payload_of_target_type_is_returned_as_is() {
        let coerced = coerce::<Order>(RawPayload::typed(order()));
        assert_eq!(coerced.strategy(), Some(Strategy::Identity));
        assert_eq!(coerced.into_value(), Some(order()));
    }

    #[test]
    fn json_text_is_parsed() {
        let coerced = coerce::<Order>(r#"{"customerName":"John Doe","amount":100}"#.into());
        assert_eq!(coerced.strategy(), Some(Strategy::JsonText));
        assert_eq!(coerced.into_value(), Some(order()));
    }

    #[test]
    fn json_tree_keys_match_case_insensitively() {
        let raw = RawPayload::from(json!({
            "CustomerName": "John Doe",
            "AMOUNT": 100,
            "address": { "street_name": "Main St" },
            "unknown": true
        }));
        let coerced = coerce::<Order>(raw);
        assert_eq!(coerced.strategy(), Some(Strategy::JsonTree));
        let value = coerced.into_value().unwrap();
        assert_eq!(value.customer_name, "John Doe");
        assert_eq!(value.address.street_name, "Main St");
    }

    #[test]
    fn members_of_the_wrong_type_keep_their_default() {
        let doc = br#"{"customerName":"John Doe","amount":"100","currency":{"code":"EUR"}}"#;
        let coerced = coerce::<InvoiceInstance>(RawPayload::Document(doc.to_vec()));
        assert_eq!(coerced.strategy(), Some(Strategy::JsonDocument));

        let invoice = coerced.into_value().unwrap();
        assert_eq!(invoice.customer_name, "John Doe");
        assert_eq!(invoice.amount, 100.0);
        assert_eq!(invoice.currency, "");
    }

    #[test]
    fn bad_collection_elements_do_not_discard_the_rest() {
        let raw = RawPayload::from(json!({
            "customerName": "John Doe",
            "items": [
                { "description": "Consulting", "quantity": "two", "unitPrice": 50 },
                { "description": "Support", "quantity": 1, "unitPrice": 20 }
            ]
        }));
        let invoice = coerce::<InvoiceInstance>(raw).into_value().unwrap();
        assert_eq!(
            invoice.items,
            vec![
                LineItem {
                    description: "Consulting".to_string(),
                    quantity: 0.0,
                    unit_price: 50.0,
                },
                LineItem {
                    description: "Support".to_string(),
                    quantity: 1.0,
                    unit_price: 20.0,
                },
            ]
        );
    }

    #[test]
    fn nested_collection_keys_match_case_insensitively() {
        let raw = RawPayload::from(json!({
            "CustomerName": "John Doe",
            "Items": [{ "Description": "Consulting", "Quantity": 2, "UNIT_PRICE": 50 }],
            "Notes": "net 30"
        }));
        let coerced = coerce::<InvoiceInstance>(raw);
        assert_eq!(coerced.strategy(), Some(Strategy::JsonTree));

        let invoice = coerced.into_value().unwrap();
        assert_eq!(invoice.customer_name, "John Doe");
        assert_eq!(invoice.notes.as_deref(), Some("net 30"));
        assert_eq!(
            invoice.items,
            vec![LineItem {
                description: "Consulting".to_string(),
                quantity: 2.0,
                unit_price: 50.0,
            }]
        );
    }

    #[test]
    fn documents_fall_back_to_yaml() {
        let json_doc = br#"{"customerName":"John Doe","amount":100}"#.to_vec();
        let coerced = coerce::<Order>(RawPayload::Document(json_doc));
        assert_eq!(coerced.strategy(), Some(Strategy::JsonDocument));

        let yaml_doc = b"customer_name: John Doe\namount: 100\n".to_vec();
        let coerced = coerce::<Order>(RawPayload::Document(yaml_doc));
        assert_eq!(coerced.strategy(), Some(Strategy::JsonDocument));
        assert_eq!(coerced.into_value(), Some(order()));
    }

    #[test]
    fn other_typed_values_go_through_generic_serialization() {
        let legacy = LegacyOrder {
            customer: "John Doe".to_string(),
            amount: 100.0,
        };
        let coerced = coerce::<Order>(RawPayload::typed(legacy));
        assert_eq!(coerced.strategy(), Some(Strategy::Generic));
        assert_eq!(coerced.into_value(), Some(order()));
    }

    #[test]
    fn malformed_input_falls_back_to_default() {
        for raw in [
            RawPayload::from("{not json"),
            RawPayload::Document(vec![0xff, 0xfe, 0x00]),
            RawPayload::Json(Value::Null),
            RawPayload::from(json!([1, 2, 3])),
        ] {
            let coerced = coerce::<Order>(raw);
            assert!(matches!(coerced, Coerced::Defaulted(_)), "{coerced:?}");
            assert_eq!(coerced.into_value(), Some(Order::default()));
        }
    }

    #[test]
    fn models_without_fallback_return_the_original_payload() {
        let coerced = coerce::<Strict>(RawPayload::from("nope"));
        match coerced {
            Coerced::Original(RawPayload::Text(text)) => assert_eq!(text, "nope"),
            other => panic!("expected original payload, got {other:?}"),
        }
    }

    #[test]
    fn erased_model_keeps_resolution() {
        let model = coerce::<Order>(json!({"customerName": "Jane", "amount": 5}).into()).into_model();
        assert_eq!(model.model, Some("Order"));
        assert_eq!(model.resolution, Resolution::Strategy(Strategy::JsonTree));
        assert_eq!(model.value["customerName"], "Jane");

        let raw = CoercedModel::raw(RawPayload::from("plain words"));
        assert_eq!(raw.value, json!("plain words"));
        assert_eq!(raw.resolution, Resolution::Uncoerced);
    }

    #[test]
    fn strategies_run_in_documented_order() {
        let order: Vec<Strategy> = Coercer::<Order>::new().strategies().collect();
        assert_eq!(
            order,
            vec![
                Strategy::Identity,
                Strategy::JsonText,
                Strategy::JsonTree,
                Strategy::JsonDocument,
                Strategy::Generic,
            ]
        );
    }
}
