//! ConnectWise Manage REST client

use crate::config::ConnectWiseConfig;
use crate::repository::{RepositoryError, TicketRepository};
use async_trait::async_trait;
use kumawise_core::{NewTicket, Ticket};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Serialize;
use tracing::{error, info, warn};

// Client for the service ticket endpoints
pub struct ConnectWiseClient {
    client: Client,
    base_url: String,
    // (company+public_key, private_key) for basic auth
    credentials: Option<(String, String)>,
    client_id: Option<String>,
    service_board: String,
    status_new: String,
    status_closed: String,
}

// POST /service/tickets body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTicketRequest<'a> {
    summary: &'a str,
    record_type: &'static str,
    board: NameRef<'a>,
    status: NameRef<'a>,
    initial_description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    company: Option<CompanyRef<'a>>,
}

#[derive(Serialize)]
struct NameRef<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct CompanyRef<'a> {
    identifier: &'a str,
}

// one JSON-patch operation
#[derive(Serialize)]
struct PatchOperation<'a> {
    op: &'static str,
    path: &'static str,
    value: &'a str,
}

// POST /service/tickets/{id}/notes body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TicketNote<'a> {
    text: &'a str,
    detail_description_flag: bool,
    internal_analysis_flag: bool,
    resolution_flag: bool,
}

impl ConnectWiseClient {
    pub fn new(config: &ConnectWiseConfig) -> Result<Self, RepositoryError> {
        if !config.has_credentials() {
            warn!("ConnectWise credentials (including CW_CLIENT_ID) are missing. API calls will fail.");
        }

        Url::parse(&config.base_url)
            .map_err(|e| RepositoryError::InvalidRequest(format!("CW_URL {}: {}", config.base_url, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        let credentials = match (&config.company, &config.public_key, &config.private_key) {
            (Some(company), Some(public_key), Some(private_key)) => {
                Some((format!("{}+{}", company, public_key), private_key.clone()))
            }
            _ => None,
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            client_id: config.client_id.clone(),
            service_board: config.service_board.clone(),
            status_new: config.status_new.clone(),
            status_closed: config.status_closed.clone(),
        })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut request = self.client.request(method, url);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }
        if let Some(client_id) = &self.client_id {
            request = request.header("clientId", client_id);
        }
        request
    }

    fn url(&self, path: &str) -> Result<Url, RepositoryError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|e| RepositoryError::InvalidRequest(format!("{}: {}", raw, e)))
    }

    // turn non-2xx into an Api error carrying the body for the logs
    async fn check(response: Response) -> Result<Response, RepositoryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RepositoryError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn add_resolution_note(&self, ticket_id: u64, resolution: &str) -> Result<(), RepositoryError> {
        let note = TicketNote {
            text: resolution,
            detail_description_flag: true,
            internal_analysis_flag: false,
            resolution_flag: true,
        };
        let url = self.url(&format!("/service/tickets/{}/notes", ticket_id))?;
        let response = self.request(Method::POST, url).json(&note).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

// ConnectWise conditions are single-quoted string literals
fn escape_condition(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl TicketRepository for ConnectWiseClient {
    async fn find_open_ticket(&self, summary: &str) -> Result<Option<Ticket>, RepositoryError> {
        let conditions = format!(
            "closedFlag=false AND summary contains '{}'",
            escape_condition(summary)
        );
        let url = Url::parse_with_params(
            &format!("{}/service/tickets", self.base_url),
            &[("conditions", conditions.as_str()), ("pageSize", "1")],
        )
        .map_err(|e| RepositoryError::InvalidRequest(e.to_string()))?;

        let result = async {
            let response = self.request(Method::GET, url).send().await?;
            let tickets: Vec<Ticket> = Self::check(response).await?.json().await?;
            Ok::<_, RepositoryError>(tickets.into_iter().next())
        }
        .await;

        if let Err(e) = &result {
            error!(summary, error = %e, "Error finding ticket");
        }
        result
    }

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket, RepositoryError> {
        let body = CreateTicketRequest {
            summary: ticket.summary.as_str(),
            record_type: "ServiceTicket",
            board: NameRef { name: &self.service_board },
            status: NameRef { name: &self.status_new },
            initial_description: &ticket.description,
            company: ticket
                .company_id
                .as_deref()
                .map(|identifier| CompanyRef { identifier }),
        };
        let url = self.url("/service/tickets")?;

        let result = async {
            let response = self.request(Method::POST, url).json(&body).send().await?;
            let created: Ticket = Self::check(response).await?.json().await?;
            Ok::<_, RepositoryError>(created)
        }
        .await;

        match &result {
            Ok(created) => info!(ticket_id = created.id, monitor = %ticket.monitor_name, "Created ticket"),
            Err(e) => error!(monitor = %ticket.monitor_name, error = %e, "Error creating ticket"),
        }
        result
    }

    async fn close_ticket(&self, ticket_id: u64, resolution: &str) -> Result<(), RepositoryError> {
        let patch = [PatchOperation {
            op: "replace",
            path: "/status/name",
            value: &self.status_closed,
        }];
        let url = self.url(&format!("/service/tickets/{}", ticket_id))?;

        let result = async {
            let response = self.request(Method::PATCH, url).json(&patch).send().await?;
            Self::check(response).await?;
            Ok::<_, RepositoryError>(())
        }
        .await;

        if let Err(e) = result {
            error!(ticket_id, error = %e, "Error closing ticket");
            return Err(e);
        }

        // the status change already happened; a lost note is not worth a retry
        if let Err(e) = self.add_resolution_note(ticket_id, resolution).await {
            warn!(ticket_id, error = %e, "Closed ticket but failed to add resolution note");
        }

        info!(ticket_id, "Closed ticket");
        Ok(())
    }
}
