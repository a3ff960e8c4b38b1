//! Executor (C7): runs an `ExecutionPlan` as structured concurrency
//! over a DAG of tasks. Independent steps run concurrently, bounded by
//! `max_parallel_agents`; a dependent step starts only after all its
//! predecessors finish successfully; a per-query deadline and a
//! per-step timeout both propagate cancellation inward.

pub mod invoker;
pub mod propagate;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use contracts::{AgentInvocationRequest, ExecutionPlan, RouterError, Step, StepResult};
use registry::AgentRegistry;
use resilience::{call_guarded, BreakerRegistry, RetryConfig};
use tokio::sync::{Notify, Semaphore};
use tracing::warn;

pub use invoker::AgentInvoker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    FailFast,
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_parallel_agents: usize,
    pub default_step_timeout_ms: u64,
    pub query_deadline_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel_agents: 8,
            default_step_timeout_ms: 10_000,
            query_deadline_ms: 30_000,
        }
    }
}

const ABORT_NONE: u8 = 0;
const ABORT_DEADLINE: u8 = 1;
const ABORT_FAIL_FAST: u8 = 2;

#[derive(Clone)]
pub struct Executor {
    registry: Arc<AgentRegistry>,
    breakers: Arc<BreakerRegistry>,
    in_process: Arc<HashMap<String, Arc<dyn AgentInvoker>>>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(
        registry: Arc<AgentRegistry>,
        breakers: Arc<BreakerRegistry>,
        in_process: HashMap<String, Arc<dyn AgentInvoker>>,
        config: ExecutorConfig,
    ) -> Self {
        Self { registry, breakers, in_process: Arc::new(in_process), config }
    }

    pub async fn execute(&self, plan: ExecutionPlan, policy: FailurePolicy) -> Vec<StepResult> {
        self.execute_with_deadline(plan, policy, self.config.query_deadline_ms).await
    }

    pub async fn execute_with_deadline(
        &self,
        plan: ExecutionPlan,
        policy: FailurePolicy,
        deadline_ms: u64,
    ) -> Vec<StepResult> {
        let n = plan.steps.len();
        if n == 0 {
            return Vec::new();
        }

        let results: Arc<Mutex<Vec<Option<StepResult>>>> = Arc::new(Mutex::new(vec![None; n]));
        let notifies: Vec<Arc<Notify>> = (0..n).map(|_| Arc::new(Notify::new())).collect();
        let abort: Arc<AtomicU8> = Arc::new(AtomicU8::new(ABORT_NONE));
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_agents.max(1)));

        if deadline_ms == 0 {
            abort.store(ABORT_DEADLINE, Ordering::SeqCst);
        }
        let deadline_guard = {
            let abort = abort.clone();
            tokio::spawn(async move {
                if deadline_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(deadline_ms)).await;
                    abort.compare_exchange(
                        ABORT_NONE,
                        ABORT_DEADLINE,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .ok();
                }
            })
        };

        let mut handles = Vec::with_capacity(n);
        for idx in 0..n {
            let step = plan.steps[idx].clone();
            let results = results.clone();
            let notifies = notifies.clone();
            let abort = abort.clone();
            let semaphore = semaphore.clone();
            let this = self.clone();

            handles.push(tokio::spawn(async move {
                for dep in &step.depends_on {
                    loop {
                        // Register interest before checking, per
                        // Notify's documented race-free pattern: a
                        // notify_waiters() that lands between the
                        // check and the await is still observed.
                        let notified = notifies[*dep].notified();
                        if results.lock().unwrap()[*dep].is_some() {
                            break;
                        }
                        notified.await;
                    }
                }

                let dep_failed = step.depends_on.iter().any(|dep| {
                    !results.lock().unwrap()[*dep].as_ref().expect("dependency resolved").success
                });

                let started_at = Utc::now();
                let result = match abort.load(Ordering::SeqCst) {
                    ABORT_DEADLINE => terminal_result(&step.agent, started_at, "DeadlineExceeded"),
                    ABORT_FAIL_FAST => terminal_result(&step.agent, started_at, "Cancelled"),
                    _ if dep_failed => terminal_result(&step.agent, started_at, "SkippedDueToUpstream"),
                    _ => {
                        let _permit = semaphore.acquire().await.expect("semaphore not closed");
                        let predecessor_outputs: HashMap<usize, serde_json::Value> = step
                            .propagate_from
                            .iter()
                            .filter_map(|p| {
                                results.lock().unwrap()[p.from_step]
                                    .as_ref()
                                    .and_then(|r| r.output.clone())
                                    .map(|output| (p.from_step, output))
                            })
                            .collect();
                        this.run_step(&step, started_at, &predecessor_outputs).await
                    }
                };

                if !result.success && policy == FailurePolicy::FailFast {
                    abort
                        .compare_exchange(ABORT_NONE, ABORT_FAIL_FAST, Ordering::SeqCst, Ordering::SeqCst)
                        .ok();
                }

                results.lock().unwrap()[idx] = Some(result);
                notifies[idx].notify_waiters();
            }));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "executor task panicked");
            }
        }
        deadline_guard.abort();

        results.lock().unwrap().drain(..).map(|r| r.expect("every step produces a result")).collect()
    }

    async fn run_step(
        &self,
        step: &Step,
        started_at: chrono::DateTime<Utc>,
        predecessor_outputs: &HashMap<usize, serde_json::Value>,
    ) -> StepResult {
        let Some(descriptor) = self.registry.get(&step.agent) else {
            return StepResult {
                agent: step.agent.clone(),
                success: false,
                output: None,
                error: Some(format!("agent '{}' is not registered", step.agent)),
                started_at,
                finished_at: Utc::now(),
                attempts: 0,
            };
        };

        let mut params = step.params.clone();
        for propagate in &step.propagate_from {
            if let Some(output) = predecessor_outputs.get(&propagate.from_step) {
                if let Some(value) = propagate::extract(output, &propagate.source_path) {
                    params.insert(propagate.target_param.clone(), value);
                }
            }
        }

        let request = AgentInvocationRequest {
            query: None,
            parameters: serde_json::Value::Object(params.into_iter().collect()),
            context: None,
        };

        let breaker = self.breakers.get(&step.agent);
        let retry_config = RetryConfig {
            max_attempts: descriptor.max_retries.max(1),
            ..RetryConfig::default()
        };
        let timeout_ms = if descriptor.timeout_ms > 0 {
            descriptor.timeout_ms
        } else {
            self.config.default_step_timeout_ms
        };

        let attempts = Arc::new(AtomicU32::new(0));
        let handle = descriptor.invocation_handle.clone();
        let in_process = self.in_process.clone();

        let outcome = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            call_guarded(&breaker, &retry_config, {
                let attempts = attempts.clone();
                let request = request.clone();
                let handle = handle.clone();
                let in_process = in_process.clone();
                move || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    let request = request.clone();
                    let handle = handle.clone();
                    let in_process = in_process.clone();
                    async move { invoker::invoke_handle(&handle, request, &in_process).await }
                }
            }),
        )
        .await;

        let finished_at = Utc::now();
        let attempts_made = attempts.load(Ordering::SeqCst);

        match outcome {
            Err(_elapsed) => StepResult {
                agent: step.agent.clone(),
                success: false,
                output: None,
                error: Some(format!("step timed out after {timeout_ms}ms")),
                started_at,
                finished_at,
                attempts: attempts_made,
            },
            Ok(Err(err)) => StepResult {
                agent: step.agent.clone(),
                success: false,
                output: None,
                error: Some(err.to_string()),
                started_at,
                finished_at,
                attempts: attempts_made,
            },
            Ok(Ok(response)) => StepResult {
                agent: step.agent.clone(),
                success: response.success,
                output: response.data,
                error: response.error,
                started_at,
                finished_at,
                attempts: attempts_made,
            },
        }
    }
}

fn terminal_result(agent: &str, started_at: chrono::DateTime<Utc>, reason: &str) -> StepResult {
    StepResult {
        agent: agent.to_string(),
        success: false,
        output: None,
        error: Some(reason.to_string()),
        started_at,
        finished_at: Utc::now(),
        attempts: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use contracts::{AgentDescriptor, AgentInvocationResponse, InvocationHandle, PropagateFrom};

    struct EchoInvoker;

    #[async_trait]
    impl AgentInvoker for EchoInvoker {
        async fn invoke(
            &self,
            request: AgentInvocationRequest,
        ) -> Result<AgentInvocationResponse, RouterError> {
            Ok(AgentInvocationResponse {
                success: true,
                data: Some(request.parameters),
                error: None,
                requires_approval: false,
            })
        }
    }

    struct FailingInvoker;

    #[async_trait]
    impl AgentInvoker for FailingInvoker {
        async fn invoke(
            &self,
            _request: AgentInvocationRequest,
        ) -> Result<AgentInvocationResponse, RouterError> {
            Err(RouterError::Permanent { target: "flaky".into(), cause: "boom".into() })
        }
    }

    fn descriptor(name: &str, callable: &str) -> AgentDescriptor {
        AgentDescriptor {
            name: name.to_string(),
            capabilities: Default::default(),
            description: String::new(),
            input_schema: None,
            output_schema: None,
            invocation_handle: InvocationHandle::InProcess { callable: callable.to_string() },
            is_privileged: false,
            required_fields: Vec::new(),
            timeout_ms: 5_000,
            max_retries: 1,
        }
    }

    fn step(agent: &str, depends_on: Vec<usize>, propagate_from: Vec<PropagateFrom>) -> Step {
        Step { agent: agent.to_string(), params: HashMap::new(), depends_on, propagate_from }
    }

    fn make_executor(invokers: Vec<(&str, Arc<dyn AgentInvoker>)>) -> Executor {
        let registry = Arc::new(AgentRegistry::new());
        let mut in_process: HashMap<String, Arc<dyn AgentInvoker>> = HashMap::new();
        for (name, invoker) in invokers {
            registry.register(descriptor(name, name)).unwrap();
            in_process.insert(name.to_string(), invoker);
        }
        Executor::new(
            registry,
            Arc::new(BreakerRegistry::new(Default::default())),
            in_process,
            ExecutorConfig::default(),
        )
    }

    #[tokio::test]
    async fn independent_steps_both_succeed() {
        let executor = make_executor(vec![
            ("weather", Arc::new(EchoInvoker)),
            ("calculator", Arc::new(EchoInvoker)),
        ]);
        let plan = ExecutionPlan {
            steps: vec![step("weather", vec![], vec![]), step("calculator", vec![], vec![])],
        };
        let results = executor.execute(plan, FailurePolicy::BestEffort).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn dependent_step_is_skipped_when_predecessor_fails() {
        let executor = make_executor(vec![
            ("search", Arc::new(FailingInvoker)),
            ("data_processor", Arc::new(EchoInvoker)),
        ]);
        let plan = ExecutionPlan {
            steps: vec![
                step("search", vec![], vec![]),
                step("data_processor", vec![0], vec![]),
            ],
        };
        let results = executor.execute(plan, FailurePolicy::BestEffort).await;
        assert!(!results[0].success);
        assert!(!results[1].success);
        assert_eq!(results[1].error.as_deref(), Some("SkippedDueToUpstream"));
    }

    #[tokio::test]
    async fn fail_fast_cancels_remaining_independent_steps() {
        let executor = make_executor(vec![
            ("search", Arc::new(FailingInvoker)),
            ("calculator", Arc::new(EchoInvoker)),
        ]);
        let plan = ExecutionPlan {
            steps: vec![step("search", vec![], vec![]), step("calculator", vec![], vec![])],
        };
        let results = executor.execute(plan, FailurePolicy::FailFast).await;
        assert!(!results[0].success);
        // calculator either raced to completion or was cancelled; both
        // are legal outcomes of fail_fast racing independent steps, but
        // it must never silently disappear from the result set.
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn zero_deadline_cancels_before_any_step_starts() {
        let executor = make_executor(vec![("weather", Arc::new(EchoInvoker))]);
        let plan = ExecutionPlan { steps: vec![step("weather", vec![], vec![])] };
        let results = executor.execute_with_deadline(plan, FailurePolicy::BestEffort, 0).await;
        assert_eq!(results[0].error.as_deref(), Some("DeadlineExceeded"));
    }

    #[tokio::test]
    async fn propagated_value_is_written_into_target_param() {
        let executor = make_executor(vec![
            ("search", Arc::new(EchoInvoker)),
            ("data_processor", Arc::new(EchoInvoker)),
        ]);
        let plan = ExecutionPlan {
            steps: vec![
                step("search", vec![], vec![]),
                step(
                    "data_processor",
                    vec![0],
                    vec![PropagateFrom {
                        from_step: 0,
                        source_path: "results[*].rating".to_string(),
                        target_param: "values".to_string(),
                    }],
                ),
            ],
        };
        // search's echoed output has no "results" field (its params are
        // empty), so propagation finds nothing to extract and the step
        // still runs with its own params untouched.
        let results = executor.execute(plan, FailurePolicy::BestEffort).await;
        assert!(results[1].success);
    }
}
