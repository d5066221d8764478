//! crates/know_flow_client/src/endpoints.rs
//!
//! Typed operations over [`ApiClient::request`], one per API route.

use know_flow_core::analytics::{Analytics, Timeframe};
use know_flow_core::domain::{LearningContext, LearningPlan, PlanStatus, StudySession, User};
use know_flow_core::insights::Recommendation;
use know_flow_core::protocol::{
    AuthResponse, BatchGenerateRequest, BatchGenerateResponse, BatchPlanItem,
    CreateSessionRequest, GenerateLearningPlanRequest, HealthStatus, ImportSummary,
    KnowledgeGraphView, LoginRequest, PlanListOptions, PlanPage, PlanSummary, SearchOptions,
    SearchResult, SignupRequest, SystemMetrics, SystemStatus, UpdatePlanStatusRequest,
    UpdatePreferencesRequest, UpdateProgressRequest, UserExport, UserImport, UserPromptRequest,
    UserPromptResponse,
};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::client::{ApiClient, RequestOptions};
use crate::error::ClientError;
use crate::response::ResponseHandler;

/// Joins raw segments into an absolute path, percent-encoding each one.
fn path(segments: &[&str]) -> Result<String, ClientError> {
    let mut url =
        Url::parse("http://localhost/").map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidRequest("URL cannot carry a path".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.path().to_string())
}

fn plain<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

/// The legacy prompt response is not enveloped; `success: false` is still a failure.
fn prompt_response(body: Value) -> Result<UserPromptResponse, ClientError> {
    let response: UserPromptResponse = plain(body)?;
    if !response.success {
        return Err(ClientError::Api {
            status: 200,
            message: response.message,
        });
    }
    Ok(response)
}

impl ApiClient {
    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let body = self.request(endpoint, options).await?;
        ResponseHandler::into_data(body)
    }

    //=====================================================================================
    // Health & system
    //=====================================================================================

    pub async fn health_check(&self) -> Result<HealthStatus, ClientError> {
        plain(self.request("/health", RequestOptions::get()).await?)
    }

    pub async fn system_status(&self) -> Result<SystemStatus, ClientError> {
        self.call("/api/system/status", RequestOptions::get()).await
    }

    pub async fn system_metrics(&self) -> Result<SystemMetrics, ClientError> {
        self.call("/api/system/metrics", RequestOptions::get()).await
    }

    //=====================================================================================
    // Auth & users
    //=====================================================================================

    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse, ClientError> {
        self.call("/auth/signup", RequestOptions::post(request)?).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.call("/auth/login", RequestOptions::post(&request)?).await
    }

    pub async fn get_user(&self, uid: &str) -> Result<User, ClientError> {
        self.call(&path(&["api", "users", uid])?, RequestOptions::get())
            .await
    }

    pub async fn update_preferences(
        &self,
        uid: &str,
        update: &UpdatePreferencesRequest,
    ) -> Result<User, ClientError> {
        self.call(
            &path(&["api", "users", uid, "preferences"])?,
            RequestOptions::put(update)?,
        )
        .await
    }

    //=====================================================================================
    // Plan generation
    //=====================================================================================

    /// Asks the server to generate and store a plan for `prompt`.
    pub async fn generate_learning_plan(
        &self,
        user_id: &str,
        prompt: &str,
        context: &LearningContext,
    ) -> Result<PlanSummary, ClientError> {
        let request = GenerateLearningPlanRequest {
            user_id: user_id.to_string(),
            prompt: prompt.to_string(),
            context: context.clone(),
        };
        self.call("/api/generate-learning-plan", RequestOptions::post(&request)?)
            .await
    }

    /// Legacy prompt submission; the response is not enveloped.
    pub async fn submit_prompt(
        &self,
        user_id: &str,
        prompt: &str,
    ) -> Result<UserPromptResponse, ClientError> {
        let request = UserPromptRequest {
            user_id: user_id.to_string(),
            prompt: prompt.to_string(),
        };
        let body = self
            .request("/api/user-prompt", RequestOptions::post(&request)?)
            .await?;
        prompt_response(body)
    }

    /// The query-string form of [`ApiClient::submit_prompt`].
    pub async fn submit_prompt_query(
        &self,
        user_id: &str,
        prompt: &str,
    ) -> Result<UserPromptResponse, ClientError> {
        let request = RequestOptions::get()
            .query("userId", user_id)
            .query("prompt", prompt);
        prompt_response(self.request("/api/user-prompt", request).await?)
    }

    pub async fn batch_generate_plans(
        &self,
        requests: Vec<BatchPlanItem>,
    ) -> Result<Vec<PlanSummary>, ClientError> {
        let request = BatchGenerateRequest { requests };
        let response: BatchGenerateResponse = self
            .call("/api/plans/batch", RequestOptions::post(&request)?)
            .await?;
        Ok(response.plans)
    }

    //=====================================================================================
    // Plans
    //=====================================================================================

    pub async fn list_user_plans(
        &self,
        user_id: &str,
        options: &PlanListOptions,
    ) -> Result<PlanPage, ClientError> {
        let mut request = RequestOptions::get();
        if let Some(limit) = options.limit {
            request = request.query("limit", limit);
        }
        if let Some(offset) = options.offset {
            request = request.query("offset", offset);
        }
        if let Some(status) = options.status {
            request = request.query("status", status);
        }
        if let Some(difficulty) = options.difficulty {
            request = request.query("difficulty", difficulty);
        }
        if !options.topics.is_empty() {
            request = request.query("topics", options.topics.join(","));
        }
        self.call(&path(&["api", "users", user_id, "plans"])?, request)
            .await
    }

    pub async fn get_plan(&self, plan_id: Uuid) -> Result<LearningPlan, ClientError> {
        self.call(&format!("/api/plans/{}", plan_id), RequestOptions::get())
            .await
    }

    pub async fn update_plan_status(
        &self,
        plan_id: Uuid,
        status: PlanStatus,
    ) -> Result<LearningPlan, ClientError> {
        self.call(
            &format!("/api/plans/{}/status", plan_id),
            RequestOptions::put(&UpdatePlanStatusRequest { status })?,
        )
        .await
    }

    pub async fn delete_plan(&self, plan_id: Uuid) -> Result<(), ClientError> {
        let body = self
            .request(
                &format!("/api/plans/{}", plan_id),
                RequestOptions::method(Method::DELETE),
            )
            .await?;
        if !ResponseHandler::is_success(&body) {
            return Err(ClientError::Api {
                status: 200,
                message: ResponseHandler::get_error_message(&body)
                    .unwrap_or_else(|| "Request was not successful".to_string()),
            });
        }
        Ok(())
    }

    //=====================================================================================
    // Knowledge graph
    //=====================================================================================

    pub async fn get_knowledge_graph(
        &self,
        user_id: &str,
    ) -> Result<KnowledgeGraphView, ClientError> {
        self.call(
            &path(&["api", "users", user_id, "knowledge-graph"])?,
            RequestOptions::get(),
        )
        .await
    }

    pub async fn get_plan_knowledge_graph(
        &self,
        plan_id: Uuid,
    ) -> Result<KnowledgeGraphView, ClientError> {
        self.call(
            &format!("/api/plans/{}/knowledge-graph", plan_id),
            RequestOptions::get(),
        )
        .await
    }

    //=====================================================================================
    // Sessions & progress
    //=====================================================================================

    pub async fn create_session(
        &self,
        plan_id: Uuid,
        concepts: Vec<String>,
    ) -> Result<StudySession, ClientError> {
        let request = CreateSessionRequest { plan_id, concepts };
        self.call("/api/sessions", RequestOptions::post(&request)?)
            .await
    }

    pub async fn end_session(&self, session_id: Uuid) -> Result<StudySession, ClientError> {
        self.call(
            &format!("/api/sessions/{}/end", session_id),
            RequestOptions::method(Method::POST),
        )
        .await
    }

    /// Marks a lesson (in)complete and returns the plan with its recomputed progress.
    pub async fn update_progress(
        &self,
        update: &UpdateProgressRequest,
    ) -> Result<LearningPlan, ClientError> {
        self.call("/api/progress", RequestOptions::post(update)?).await
    }

    //=====================================================================================
    // Analytics, recommendations, search
    //=====================================================================================

    pub async fn get_analytics(
        &self,
        user_id: &str,
        timeframe: Timeframe,
    ) -> Result<Analytics, ClientError> {
        self.call(
            &path(&["api", "users", user_id, "analytics"])?,
            RequestOptions::get().query("timeframe", timeframe),
        )
        .await
    }

    pub async fn get_recommendations(
        &self,
        user_id: &str,
    ) -> Result<Vec<Recommendation>, ClientError> {
        self.call(
            &path(&["api", "users", user_id, "recommendations"])?,
            RequestOptions::get(),
        )
        .await
    }

    pub async fn search_content(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, ClientError> {
        let mut request = RequestOptions::get().query("q", query);
        if let Some(difficulty) = options.difficulty {
            request = request.query("difficulty", difficulty);
        }
        if !options.topics.is_empty() {
            request = request.query("topics", options.topics.join(","));
        }
        if let Some(limit) = options.limit {
            request = request.query("limit", limit);
        }
        self.call("/api/search", request).await
    }

    //=====================================================================================
    // Export / import
    //=====================================================================================

    pub async fn export_user_data(&self, user_id: &str) -> Result<UserExport, ClientError> {
        self.call(
            &path(&["api", "users", user_id, "export"])?,
            RequestOptions::get(),
        )
        .await
    }

    pub async fn import_user_data(
        &self,
        user_id: &str,
        data: &UserImport,
    ) -> Result<ImportSummary, ClientError> {
        self.call(
            &path(&["api", "users", user_id, "import"])?,
            RequestOptions::post(data)?,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segments_are_escaped_individually() {
        assert_eq!(path(&["api", "users", "u-1_a.b~c"]).unwrap(), "/api/users/u-1_a.b~c");
        assert_eq!(
            path(&["api", "users", "a/b c", "plans"]).unwrap(),
            "/api/users/a%2Fb%20c/plans"
        );
        assert_eq!(path(&["api", "users", "é%"]).unwrap(), "/api/users/%C3%A9%25");
    }
}
