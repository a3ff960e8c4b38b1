//! HTTP Surface (C13): `axum` routers over the full pipeline
//! (Reasoner -> Planner -> Executor -> Validator -> Consolidator), plus
//! the gateway's direct `/v1/generate` passthrough and operational
//! endpoints.

pub mod demo_agents;
mod error;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{
    AgentDescriptor, ExecutionPlan, FinalSummary, GenerateRequest, GenerationResponse,
    InvocationHandle, Query, QueryOptions, ReasoningMethod, ReasoningMode, RouterError, Step,
};
use executor::{AgentInvoker, Executor, ExecutorConfig as ExecutorRuntimeConfig, FailurePolicy};
use gateway::{Gateway, GatewayConfig};
use planner::Planner;
use provider_adapter::adapters::EchoAdapter;
use provider_adapter::ProviderAdapter;
use reasoner::{Reasoner, ReasonerConfig};
use registry::AgentRegistry;
use resilience::{BreakerRegistry, CircuitBreakerConfig};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use validator::Validator;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub gateway: Arc<Gateway>,
    pub registry: Arc<AgentRegistry>,
    pub reasoner: Arc<Reasoner>,
    pub planner: Arc<Planner>,
    pub executor: Arc<Executor>,
    pub validator: Arc<Validator>,
    pub audit: Arc<audit::AuditLogger>,
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/query", post(query_handler))
        .route("/v1/generate", post(generate_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(protected)
        .route("/health", get(health_handler))
        .route("/providers", get(providers_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(key) = &state.config.server.auth_api_key else {
        return next.run(req).await;
    };
    let expected = format!("Bearer {key}");
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == expected)
        .unwrap_or(false);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"kind": "Unauthorized", "message": "missing or invalid bearer token"}})),
        )
            .into_response();
    }
    next.run(req).await
}

#[derive(Debug, Deserialize)]
struct QueryRequestBody {
    query: String,
    session_id: Option<String>,
    #[serde(default)]
    options: QueryOptions,
}

async fn query_handler(
    State(state): State<AppState>,
    Json(body): Json<QueryRequestBody>,
) -> Result<(StatusCode, Json<consolidator::ConsolidatedResponse>), ApiError> {
    if body.query.trim().is_empty() {
        return Err(ApiError::from(RouterError::BadRequest("query must not be empty".to_string())));
    }

    let query = Query::new(body.query, body.session_id, body.options);
    let audit = state.audit.open(query.id, json!({"text": query.text, "session_id": query.session_id}));

    let reasoning = match state.reasoner.reason(&query.text, query.options.reasoning_mode, &state.registry, &state.gateway).await {
        Ok(result) => result,
        Err(err) => {
            audit.error(err.kind(), &err.to_string());
            audit.close(FinalSummary { success: false, agent_count: 0, agents_used: vec![], error_count: 1 });
            return Err(ApiError::from(err));
        }
    };
    audit.reasoning(
        &format!("{:?}", reasoning.method).to_lowercase(),
        serde_json::to_value(&reasoning).unwrap_or(Value::Null),
    );

    if reasoning.method == ReasoningMethod::Reject {
        let response = consolidator::rejected(&reasoning);
        audit.close(FinalSummary { success: false, agent_count: 0, agents_used: vec![], error_count: 1 });
        return Ok((StatusCode::OK, Json(response)));
    }

    let plan = match state.planner.plan(&reasoning, &state.registry) {
        Ok(plan) => plan,
        Err(err) => {
            audit.error(err.kind(), &err.to_string());
            audit.close(FinalSummary { success: false, agent_count: 0, agents_used: vec![], error_count: 1 });
            return Err(ApiError::from(err));
        }
    };
    let original_steps: Vec<Step> = plan.steps.clone();

    let deadline_ms = query.options.deadline_ms.unwrap_or(state.config.executor.query_deadline_ms);
    let mut results = state.executor.execute_with_deadline(plan, FailurePolicy::BestEffort, deadline_ms).await;

    revalidate_steps(&state, &audit, &mut results, &original_steps).await;

    for result in &results {
        audit.agent_interaction(json!({
            "agent": result.agent,
            "success": result.success,
            "error": result.error,
            "execution_time_ms": (result.finished_at - result.started_at).num_milliseconds().max(0),
        }));
    }

    let response = consolidator::consolidate(&reasoning, &results);
    audit.close(FinalSummary {
        success: response.success,
        agent_count: response.data.len(),
        agents_used: response.data.keys().cloned().collect(),
        error_count: response.errors.len(),
    });

    Ok((status_for(&response), Json(response)))
}

/// Re-validates every successful step's output; a hallucination-
/// flagged step is rerun in isolation up to `max_revalidation_attempts`
/// times, and marked failed if it is still flagged afterwards.
async fn revalidate_steps(
    state: &AppState,
    audit: &audit::AuditHandle,
    results: &mut [contracts::StepResult],
    original_steps: &[Step],
) {
    let validator_config = validator::ValidatorConfig {
        strict: state.config.validator.strict,
        retry_on_hallucination: state.config.validator.retry_on_hallucination,
        max_revalidation_attempts: state.config.validator.max_revalidation_attempts,
    };

    for idx in 0..results.len() {
        if !results[idx].success {
            continue;
        }
        let Some(descriptor) = state.registry.get(&results[idx].agent) else { continue };

        let mut verdict = state.validator.validate_step(results[idx].output.as_ref(), &descriptor, None, &validator_config);
        audit.validation(serde_json::to_value(&verdict).unwrap_or(Value::Null));

        let mut attempt = 0;
        while !verdict.is_valid && state.validator.should_retry(&verdict, &validator_config, attempt) {
            attempt += 1;
            audit.retry_attempt(attempt, "hallucination_detected", std::slice::from_ref(&results[idx].agent));

            // propagate_from is resolved here rather than carried into the
            // retry plan: the original dependency step isn't part of this
            // isolated one-step plan, so its index would be meaningless.
            // The predecessor's output is still sitting in `results` from
            // the original run, so the propagated value is baked into
            // `params` directly instead.
            let mut retry_params = original_steps[idx].params.clone();
            for propagate in &original_steps[idx].propagate_from {
                if let Some(output) = results.get(propagate.from_step).and_then(|r| r.output.as_ref()) {
                    if let Some(value) = executor::propagate::extract(output, &propagate.source_path) {
                        retry_params.insert(propagate.target_param.clone(), value);
                    }
                }
            }
            let retry_plan = ExecutionPlan {
                steps: vec![Step {
                    agent: results[idx].agent.clone(),
                    params: retry_params,
                    depends_on: vec![],
                    propagate_from: vec![],
                }],
            };
            let mut retried = state.executor.execute(retry_plan, FailurePolicy::BestEffort).await;
            results[idx] = retried.remove(0);
            if !results[idx].success {
                break;
            }
            verdict = state.validator.validate_step(results[idx].output.as_ref(), &descriptor, None, &validator_config);
            audit.validation(serde_json::to_value(&verdict).unwrap_or(Value::Null));
        }

        if results[idx].success && !verdict.is_valid {
            results[idx].success = false;
            results[idx].error = Some("HallucinationDetected".to_string());
        }
    }
}

/// `408` only when a query's entire result set is deadline casualties;
/// every other outcome -- including partial agent failure -- is `200`
/// with the failure recorded in the response body.
fn status_for(response: &consolidator::ConsolidatedResponse) -> StatusCode {
    let all_deadline_exceeded =
        !response.errors.is_empty() && response.errors.iter().all(|e| e.kind == "DeadlineExceeded");
    if all_deadline_exceeded {
        StatusCode::REQUEST_TIMEOUT
    } else {
        StatusCode::OK
    }
}

async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let call = state.gateway.generate(request).await.map_err(ApiError::from)?;
    Ok(Json(call.response))
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let providers: HashMap<String, Value> = state
        .gateway
        .health()
        .await
        .into_iter()
        .map(|(name, health)| {
            (name, json!({"healthy": health.healthy, "latency_ms": health.latency_ms, "error": health.error}))
        })
        .collect();
    Json(json!({
        "providers": providers,
        "agents_registered": state.registry.list().len(),
    }))
}

async fn providers_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.gateway.provider_names())
}

/// Registers the four `demo_agents` against the Reasoner's built-in rule
/// table and assembles a runnable `AppState` around the given config --
/// shared by the binary entry point and this crate's integration tests
/// so the two never drift apart. `extra_providers` are tried ahead of
/// the always-present network-free echo adapter (e.g. real Anthropic /
/// Bedrock adapters the binary wires up from environment credentials).
pub fn demo_state(config: config::AppConfig, extra_providers: Vec<Arc<dyn ProviderAdapter>>) -> AppState {
    let registry = Arc::new(AgentRegistry::new());

    let descriptors = vec![
        AgentDescriptor {
            name: "weather".to_string(),
            capabilities: ["weather".to_string()].into_iter().collect(),
            description: "reports current conditions for a city".to_string(),
            input_schema: None,
            output_schema: Some(json!({"type": "object", "required": ["city", "temperature", "conditions"]})),
            invocation_handle: InvocationHandle::InProcess { callable: "weather".to_string() },
            is_privileged: false,
            required_fields: vec!["city".to_string()],
            timeout_ms: 5_000,
            max_retries: 1,
        },
        AgentDescriptor {
            name: "calculator".to_string(),
            capabilities: ["calculator".to_string()].into_iter().collect(),
            description: "sums a list of operands".to_string(),
            input_schema: None,
            output_schema: Some(json!({"type": "object", "required": ["result"]})),
            invocation_handle: InvocationHandle::InProcess { callable: "calculator".to_string() },
            is_privileged: false,
            required_fields: vec!["operands".to_string()],
            timeout_ms: 5_000,
            max_retries: 1,
        },
        AgentDescriptor {
            name: "search".to_string(),
            capabilities: ["search".to_string()].into_iter().collect(),
            description: "returns ranked results for a free-text query".to_string(),
            input_schema: None,
            output_schema: Some(json!({"type": "object", "required": ["results"]})),
            invocation_handle: InvocationHandle::InProcess { callable: "search".to_string() },
            is_privileged: false,
            required_fields: vec!["query".to_string()],
            timeout_ms: 5_000,
            max_retries: 1,
        },
        AgentDescriptor {
            name: "data_processor".to_string(),
            capabilities: ["data_processor".to_string()].into_iter().collect(),
            description: "aggregates a list of numeric values".to_string(),
            input_schema: None,
            output_schema: Some(json!({"type": "object", "required": ["result"]})),
            invocation_handle: InvocationHandle::InProcess { callable: "data_processor".to_string() },
            is_privileged: false,
            // "values" is supplied by the Planner's search -> data_processor
            // propagation rule, not present in the rule table's own params.
            required_fields: vec!["op".to_string()],
            timeout_ms: 5_000,
            max_retries: 1,
        },
    ];

    let mut in_process: HashMap<String, Arc<dyn AgentInvoker>> = HashMap::new();
    in_process.insert("weather".to_string(), Arc::new(demo_agents::WeatherAgent));
    in_process.insert("calculator".to_string(), Arc::new(demo_agents::CalculatorAgent));
    in_process.insert("search".to_string(), Arc::new(demo_agents::SearchAgent));
    in_process.insert("data_processor".to_string(), Arc::new(demo_agents::DataProcessorAgent));

    for descriptor in descriptors {
        registry.register(descriptor).expect("demo agent names are unique");
    }

    let gateway_config = GatewayConfig {
        fallback_enabled: config.fallback.enabled,
        fallback_order: config.fallback.order.clone(),
        max_fallback_attempts: config.fallback.max_attempts,
        retry_original: false,
    };
    let breaker_config = CircuitBreakerConfig { threshold: config.breaker.threshold, cooldown_ms: config.breaker.cooldown_ms };
    let mut providers = extra_providers;
    providers.push(Arc::new(EchoAdapter::new()));
    let gateway = Arc::new(Gateway::new(providers, gateway_config, breaker_config.clone()));

    let reasoner_mode = match config.reasoner.mode {
        config::ReasoningModeSetting::Rule => ReasoningMode::Rule,
        config::ReasoningModeSetting::Ai => ReasoningMode::Ai,
        config::ReasoningModeSetting::Hybrid => ReasoningMode::Hybrid,
    };
    let reasoner = Arc::new(Reasoner::new(ReasonerConfig {
        rule_accept_threshold: config.reasoner.rule_accept_threshold,
        default_mode: reasoner_mode,
    }));
    let planner = Arc::new(Planner::new());

    let executor = Arc::new(Executor::new(
        registry.clone(),
        Arc::new(BreakerRegistry::new(breaker_config)),
        in_process,
        ExecutorRuntimeConfig {
            max_parallel_agents: config.executor.max_parallel_agents,
            default_step_timeout_ms: config.executor.default_step_timeout_ms,
            query_deadline_ms: config.executor.query_deadline_ms,
        },
    ));

    let validator = Arc::new(Validator::default());
    let audit = Arc::new(audit::AuditLogger::new(audit::AuditLoggerConfig {
        log_dir: config.audit.dir.clone(),
        log_to_file: config.audit.enabled,
    }));

    AppState { config: Arc::new(config), gateway, registry, reasoner, planner, executor, validator, audit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_config() -> config::AppConfig {
        let mut config = config::AppConfig::default();
        config.audit.enabled = false;
        config
    }

    async fn post_query(app: Router, query: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/query")
            .header("content-type", "application/json")
            .body(Body::from(json!({"query": query}).to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn missing_bearer_token_is_rejected_when_auth_is_configured() {
        let mut config = test_config();
        config.server.auth_api_key = Some("secret".to_string());
        let app = router(demo_state(config, vec![]));

        let request = Request::builder().method("POST").uri("/query").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_bearer_token_is_accepted() {
        let mut config = test_config();
        config.server.auth_api_key = Some("secret".to_string());
        let app = router(demo_state(config, vec![]));

        let request = Request::builder()
            .method("POST")
            .uri("/query")
            .header("content-type", "application/json")
            .header("authorization", "Bearer secret")
            .body(Body::from(json!({"query": "weather in Tokyo"}).to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_and_providers_are_unauthenticated() {
        let mut config = test_config();
        config.server.auth_api_key = Some("secret".to_string());
        let app = router(demo_state(config, vec![]));

        let request = Request::builder().method("GET").uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn parallel_weather_and_calculator_query_succeeds() {
        let app = router(demo_state(test_config(), vec![]));
        let (status, body) = post_query(app, "get the weather in Tokyo and calculate 15 + 27").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["calculator"]["result"], json!(42.0));
        assert_eq!(body["data"]["weather"]["city"], json!("Tokyo"));
    }

    #[tokio::test]
    async fn sequential_search_then_average_propagates_ratings() {
        let app = router(demo_state(test_config(), vec![]));
        let (status, body) = post_query(app, "search AI papers and average their ratings").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        let result = body["data"]["data_processor"]["result"].as_f64().unwrap();
        assert!((result - 4.15).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_query_is_a_bad_request() {
        let app = router(demo_state(test_config(), vec![]));
        let (status, _) = post_query(app, "   ").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
