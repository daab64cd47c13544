use chrono::NaiveDateTime;
use diesel::{
    insert_into, ExpressionMethods, Insertable, QueryDsl, Queryable, RunQueryDsl, Selectable, SelectableHelper,
    SqliteConnection,
};

use crate::db::schema::github_links;
use crate::errors::ServiceError;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = github_links)]
pub struct GithubLink {
    pub id: String,
    pub issue_id: String,
    pub kind: String,
    pub reference: String,
    pub title: Option<String>,
    pub url: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone, Copy)]
#[diesel(table_name = github_links)]
pub struct NewGithubLink<'a> {
    pub id: &'a str,
    pub issue_id: &'a str,
    pub kind: &'a str,
    pub reference: &'a str,
    pub title: Option<&'a str>,
    pub url: &'a str,
    pub created_at: NaiveDateTime,
}

impl GithubLink {
    /// Records the link unless the same issue already carries it. Returns
    /// whether a row was written.
    pub fn attach(conn: &mut SqliteConnection, link: NewGithubLink<'_>) -> Result<bool, ServiceError> {
        let inserted = insert_into(github_links::table)
            .values(link)
            .on_conflict((github_links::issue_id, github_links::kind, github_links::reference))
            .do_nothing()
            .execute(conn)?;
        Ok(inserted > 0)
    }

    pub fn for_issue(conn: &mut SqliteConnection, issue_id: &str) -> Result<Vec<GithubLink>, ServiceError> {
        Ok(github_links::table
            .filter(github_links::issue_id.eq(issue_id))
            .order((github_links::created_at.asc(), github_links::id.asc()))
            .select(GithubLink::as_select())
            .load(conn)?)
    }
}
