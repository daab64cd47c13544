use proto::kanban::{self, github_service_server::GithubService, GithubLinks, IngestResult, IssueId};
use tonic::{Request, Response, Status};
use tracing::info;

use crate::controllers::{connection, required, Tenant};
use crate::db::{connection::DbPool, repos::github_link::GithubLink};
use crate::domain::{parse_or, to_timestamp, LinkKind};
use crate::github::{ingest, GithubEvent};

pub struct GithubController {
    pub pool: DbPool,
}

impl From<&GithubLink> for kanban::GithubLink {
    fn from(link: &GithubLink) -> Self {
        kanban::GithubLink {
            id: link.id.clone(),
            issue_id: link.issue_id.clone(),
            kind: parse_or(&link.kind, LinkKind::Branch).to_wire(),
            reference: link.reference.clone(),
            title: link.title.clone(),
            url: link.url.clone(),
            created_at: Some(to_timestamp(link.created_at)),
        }
    }
}

#[tonic::async_trait]
impl GithubService for GithubController {
    async fn ingest_event(&self, request: Request<kanban::GithubEvent>) -> Result<Response<IngestResult>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let data = request.get_ref();
        let event = GithubEvent {
            kind: LinkKind::from_wire(data.kind)?,
            reference: required(&data.reference, "reference")?.to_string(),
            title: data.title.clone(),
            body: data.body.clone(),
            url: required(&data.url, "url")?.to_string(),
        };

        let mut db_connection = connection(&self.pool)?;
        let linked_keys = ingest(&mut db_connection, &tenant.organization_id, &event)?;
        info!(reference = %event.reference, linked = linked_keys.len(), "ingested github event");

        Ok(Response::new(IngestResult { linked_keys }))
    }

    async fn get_issue_links(&self, request: Request<IssueId>) -> Result<Response<GithubLinks>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let mut db_connection = connection(&self.pool)?;
        let issue = tenant.issue(&mut db_connection, &request.get_ref().issue_id)?;

        let links = GithubLink::for_issue(&mut db_connection, &issue.id)?;

        Ok(Response::new(GithubLinks {
            links: links.iter().map(kanban::GithubLink::from).collect(),
        }))
    }
}
