//! Shipping-fee insurance tools.
//!
//! The lookups answer from fixed sample data. Each tool fills in its own
//! defaults for missing arguments.

use serde_json::{Map, Value, json};
use tracing::info;
use waybill_conversation::{Tool, ToolDefinition, ToolRegistry};

/// Builds the registry used by the shipping-fee agent.
#[must_use]
pub fn shipping_tools() -> ToolRegistry {
    ToolRegistry::new()
        .with(QueryGoodSupport)
        .with(QueryAftersalesByOrder)
        .with(AskForGood)
        .with(AskForOrder)
        .with(SelectAftersale)
}

/// Reads a string argument, accepting numbers as well.
fn string_arg(args: &Map<String, Value>, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Asks the user which good they mean.
pub struct AskForGood;

impl Tool for AskForGood {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "ask_for_good",
            "Ask the user for good details. Use when the user asks whether a good \
             has shipping-fee insurance without saying which good.",
        )
    }

    fn call(&self, _args: &Map<String, Value>) -> String {
        info!(tool = "ask_for_good", "tool called");
        "Please tell me which good you'd like to check, for example its ID, name, or link, \
         and I'll look up its shipping-fee insurance."
            .to_string()
    }
}

/// Asks the user for an order number.
pub struct AskForOrder;

impl Tool for AskForOrder {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "ask_for_order",
            "Ask the user for an order number. Use when the user asks about an \
             order's shipping-fee insurance without giving the order number.",
        )
    }

    fn call(&self, _args: &Map<String, Value>) -> String {
        info!(tool = "ask_for_order", "tool called");
        "Please give me your order number so I can check its shipping-fee insurance.".to_string()
    }
}

/// Checks whether a good supports shipping-fee insurance.
pub struct QueryGoodSupport;

impl Tool for QueryGoodSupport {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "query_good_support",
            "Check whether a good supports shipping-fee insurance. Call once the \
             user has identified the good.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "good_id": {"type": "string", "description": "Good ID"},
                "good_name": {"type": "string", "description": "Good name"}
            }
        }))
    }

    fn call(&self, args: &Map<String, Value>) -> String {
        let good_id = string_arg(args, "good_id").unwrap_or_else(|| "unknown".to_string());
        let good_name = string_arg(args, "good_name").unwrap_or_else(|| "food".to_string());
        info!(tool = "query_good_support", %good_id, "tool called");

        if good_name.to_lowercase().contains("food") || good_id == "123" {
            format!(
                "Good \"{good_name}\" (ID: {good_id}) supports shipping-fee insurance. \
                 Returns are reimbursed up to 20 yuan in shipping, and exchanges ship free."
            )
        } else {
            format!("Good \"{good_name}\" (ID: {good_id}) does not support shipping-fee insurance.")
        }
    }
}

/// Lists the after-sale cases of an order.
pub struct QueryAftersalesByOrder;

impl Tool for QueryAftersalesByOrder {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "query_aftersales_by_order",
            "List the after-sale cases of an order. Call once the user has given \
             an order number.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "order_id": {"type": "string", "description": "Order number"}
            },
            "required": ["order_id"]
        }))
    }

    fn call(&self, args: &Map<String, Value>) -> String {
        let order_id = string_arg(args, "order_id").unwrap_or_else(|| "123456789".to_string());
        info!(tool = "query_aftersales_by_order", %order_id, "tool called");

        if order_id == "123456789" {
            format!(
                "Order {order_id} has 2 after-sale cases:\n\
                 1. Case AS001: return request\n\
                 2. Case AS002: exchange request\n\
                 Which case would you like to check the shipping-fee insurance for?"
            )
        } else if order_id.starts_with("12") {
            format!(
                "Order {order_id} has 1 after-sale case: case AS003, return request. \
                 It is covered by shipping-fee insurance, with 12 yuan of shipping compensation."
            )
        } else {
            format!(
                "Order {order_id} has no after-sale cases yet. The order is covered by \
                 shipping-fee insurance, so any after-sale request will have its shipping \
                 protected."
            )
        }
    }
}

/// Reports the insurance status of one after-sale case.
pub struct SelectAftersale;

impl Tool for SelectAftersale {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "select_aftersale",
            "Check the shipping-fee insurance status of a specific after-sale case.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "aftersale_id": {"type": "string", "description": "After-sale case ID, e.g. AS001"}
            },
            "required": ["aftersale_id"]
        }))
    }

    fn call(&self, args: &Map<String, Value>) -> String {
        let aftersale_id = string_arg(args, "aftersale_id").unwrap_or_default();
        info!(tool = "select_aftersale", %aftersale_id, "tool called");

        match aftersale_id.as_str() {
            "AS001" => format!(
                "Case {aftersale_id} is a return and is covered by shipping-fee insurance. \
                 You can receive up to 15 yuan of shipping compensation."
            ),
            "AS002" => format!(
                "Case {aftersale_id} is an exchange and is covered by shipping-fee insurance. \
                 The merchant pays the shipping for the exchange."
            ),
            _ => format!(
                "Case {aftersale_id} meets the shipping-fee insurance conditions and is \
                 eligible for shipping compensation."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn call(name: &str, value: Value) -> String {
        shipping_tools().get(name).unwrap().call(&args(value))
    }

    #[test]
    fn registry_holds_all_tools() {
        let registry = shipping_tools();
        assert_eq!(
            registry.names(),
            vec![
                "query_good_support",
                "query_aftersales_by_order",
                "ask_for_good",
                "ask_for_order",
                "select_aftersale",
            ]
        );
    }

    #[test]
    fn ask_tools_ignore_arguments() {
        assert!(call("ask_for_order", json!({"x": 1})).contains("order number"));
        assert!(call("ask_for_good", json!({})).contains("which good"));
    }

    #[test]
    fn good_support_defaults_to_supported_food() {
        let reply = call("query_good_support", json!({}));
        assert!(reply.contains("\"food\" (ID: unknown) supports"));
    }

    #[test]
    fn good_support_by_id_or_name() {
        let by_id = call("query_good_support", json!({"good_id": 123, "good_name": "lamp"}));
        assert!(by_id.contains("supports"));
        assert!(
            call("query_good_support", json!({"good_id": "9", "good_name": "lamp"}))
                .contains("does not support")
        );
    }

    #[test]
    fn aftersales_by_order_branches() {
        let two = call("query_aftersales_by_order", json!({}));
        assert!(two.contains("Order 123456789 has 2 after-sale cases"));
        assert!(two.contains("AS001") && two.contains("AS002"));

        let one = call("query_aftersales_by_order", json!({"order_id": "1200"}));
        assert!(one.contains("AS003"));
        assert!(one.contains("12 yuan"));

        let none = call("query_aftersales_by_order", json!({"order_id": "999"}));
        assert!(none.contains("no after-sale cases"));
    }

    #[test]
    fn select_aftersale_branches() {
        assert!(call("select_aftersale", json!({"aftersale_id": "AS001"})).contains("15 yuan"));
        let merchant = call("select_aftersale", json!({"aftersale_id": "AS002"}));
        assert!(merchant.contains("merchant pays"));
        assert!(call("select_aftersale", json!({})).contains("eligible"));
    }

    #[test]
    fn argument_tools_publish_schemas() {
        let catalog = shipping_tools().catalog();
        let order = catalog
            .iter()
            .find(|d| d.name == "query_aftersales_by_order")
            .unwrap();
        assert_eq!(order.parameters["required"], json!(["order_id"]));
    }
}
