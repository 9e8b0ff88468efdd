//! Typed endpoint wrappers over the request pipeline
//!
//! Thin adapters: build the options, delegate to [`ApiClient::request`],
//! name the expected payload type. Mutating calls never touch the cache.

use serde_json::json;

use crate::client::{ApiClient, RequestOptions};
use crate::types::{
    ApiResponse, ExportFormat, ExportedReport, HealthStatus, MetricsSnapshot, NewProject,
    NewSession, PlanFeedback, Project, ProjectPatch, Report, ResearchPlan, Session,
};

impl ApiClient {
    // --- Sessions ---

    pub async fn create_session(&self, new: &NewSession) -> ApiResponse<Session> {
        self.request(RequestOptions::post("/sessions", json!(new)))
            .await
    }

    pub async fn get_session(&self, id: &str) -> ApiResponse<Session> {
        self.request(RequestOptions::get(format!("/sessions/{id}")))
            .await
    }

    pub async fn list_sessions(&self, page: u32, per_page: u32) -> ApiResponse<Vec<Session>> {
        self.request(
            RequestOptions::get("/sessions")
                .with_query("page", page)
                .with_query("per_page", per_page),
        )
        .await
    }

    pub async fn delete_session(&self, id: &str) -> ApiResponse<()> {
        self.request(RequestOptions::delete(format!("/sessions/{id}")))
            .await
    }

    // --- Plans ---

    pub async fn get_plan(&self, session_id: &str) -> ApiResponse<ResearchPlan> {
        self.request(RequestOptions::get(format!("/sessions/{session_id}/plan")))
            .await
    }

    pub async fn submit_plan_feedback(
        &self,
        session_id: &str,
        feedback: &PlanFeedback,
    ) -> ApiResponse<ResearchPlan> {
        self.request(RequestOptions::post(
            format!("/sessions/{session_id}/plan/feedback"),
            json!(feedback),
        ))
        .await
    }

    pub async fn approve_plan(&self, session_id: &str) -> ApiResponse<Session> {
        self.request(RequestOptions::post(
            format!("/sessions/{session_id}/plan/approval"),
            json!({ "approved": true }),
        ))
        .await
    }

    // --- Reports ---

    pub async fn get_report(&self, session_id: &str) -> ApiResponse<Report> {
        self.request(RequestOptions::get(format!(
            "/sessions/{session_id}/report"
        )))
        .await
    }

    pub async fn export_report(
        &self,
        session_id: &str,
        format: ExportFormat,
    ) -> ApiResponse<ExportedReport> {
        // Exports render on the server per call; never serve one from cache
        self.request(
            RequestOptions::get(format!("/sessions/{session_id}/export"))
                .with_query("format", format.as_str())
                .without_cache(),
        )
        .await
    }

    // --- Projects ---

    pub async fn list_projects(&self, page: u32, per_page: u32) -> ApiResponse<Vec<Project>> {
        self.request(
            RequestOptions::get("/projects")
                .with_query("page", page)
                .with_query("per_page", per_page),
        )
        .await
    }

    pub async fn create_project(&self, new: &NewProject) -> ApiResponse<Project> {
        self.request(RequestOptions::post("/projects", json!(new)))
            .await
    }

    pub async fn get_project(&self, id: &str) -> ApiResponse<Project> {
        self.request(RequestOptions::get(format!("/projects/{id}")))
            .await
    }

    pub async fn update_project(&self, id: &str, patch: &ProjectPatch) -> ApiResponse<Project> {
        self.request(RequestOptions::patch(
            format!("/projects/{id}"),
            json!(patch),
        ))
        .await
    }

    pub async fn delete_project(&self, id: &str) -> ApiResponse<()> {
        self.request(RequestOptions::delete(format!("/projects/{id}")))
            .await
    }

    // --- Service ---

    pub async fn health(&self) -> ApiResponse<HealthStatus> {
        self.request(RequestOptions::get("/health")).await
    }

    pub async fn metrics(&self) -> ApiResponse<MetricsSnapshot> {
        self.request(RequestOptions::get("/metrics")).await
    }
}
