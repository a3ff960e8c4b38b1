//! In-process stand-in agents matching the Reasoner's built-in rule
//! table (§4.5): `weather`, `calculator`, `search`, `data_processor`.
//! These give the orchestrator binary something runnable out of the
//! box; a real deployment registers its own agents over the same
//! `InvocationHandle` surface instead.

use async_trait::async_trait;
use contracts::{AgentInvocationRequest, AgentInvocationResponse, RouterError};
use executor::AgentInvoker;
use serde_json::{json, Value};

pub struct WeatherAgent;

#[async_trait]
impl AgentInvoker for WeatherAgent {
    async fn invoke(&self, request: AgentInvocationRequest) -> Result<AgentInvocationResponse, RouterError> {
        let city = request.parameters.get("city").and_then(Value::as_str).unwrap_or("unknown");
        Ok(AgentInvocationResponse {
            success: true,
            data: Some(json!({ "city": city, "temperature": 72, "conditions": "sunny" })),
            error: None,
            requires_approval: false,
        })
    }
}

pub struct CalculatorAgent;

#[async_trait]
impl AgentInvoker for CalculatorAgent {
    async fn invoke(&self, request: AgentInvocationRequest) -> Result<AgentInvocationResponse, RouterError> {
        let operands: Vec<f64> = request
            .parameters
            .get("operands")
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_f64).collect())
            .unwrap_or_default();
        let result: f64 = operands.iter().sum();
        Ok(AgentInvocationResponse {
            success: true,
            data: Some(json!({ "result": result })),
            error: None,
            requires_approval: false,
        })
    }
}

pub struct SearchAgent;

#[async_trait]
impl AgentInvoker for SearchAgent {
    async fn invoke(&self, request: AgentInvocationRequest) -> Result<AgentInvocationResponse, RouterError> {
        let query = request.parameters.get("query").and_then(Value::as_str).unwrap_or("");
        Ok(AgentInvocationResponse {
            success: true,
            data: Some(json!({
                "query": query,
                "results": [
                    { "title": format!("{query} overview"), "rating": 4.5 },
                    { "title": format!("{query} deep dive"), "rating": 3.8 },
                ]
            })),
            error: None,
            requires_approval: false,
        })
    }
}

pub struct DataProcessorAgent;

#[async_trait]
impl AgentInvoker for DataProcessorAgent {
    async fn invoke(&self, request: AgentInvocationRequest) -> Result<AgentInvocationResponse, RouterError> {
        let op = request.parameters.get("op").and_then(Value::as_str).unwrap_or("avg");
        let values: Vec<f64> = request
            .parameters
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_f64).collect())
            .unwrap_or_default();
        let result = match op {
            "avg" if !values.is_empty() => values.iter().sum::<f64>() / values.len() as f64,
            _ => 0.0,
        };
        Ok(AgentInvocationResponse {
            success: true,
            data: Some(json!({ "op": op, "result": result })),
            error: None,
            requires_approval: false,
        })
    }
}
