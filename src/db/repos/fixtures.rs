//! Rows shared by the repository and controller tests.

use chrono::Utc;
use diesel::{insert_into, RunQueryDsl, SqliteConnection};

use crate::db::repos::{
    board::NewBoard,
    column::{Column, NewColumn},
    issue::{Issue, NewIssue},
    project::{NewProject, Project},
};
use crate::db::schema::{board_columns, boards, issues, projects};

pub const ORGANIZATION: &str = "org-1";

pub struct SeededBoard {
    pub project_id: String,
    pub board_id: String,
    pub columns: Vec<String>,
}

pub fn seed_board(conn: &mut SqliteConnection) -> SeededBoard {
    seed_project(conn, ORGANIZATION, "KAN")
}

/// A project with one board holding To Do, In Progress and Done.
pub fn seed_project(conn: &mut SqliteConnection, organization_id: &str, key: &str) -> SeededBoard {
    let now = Utc::now().naive_utc();
    let project_id = uuid::Uuid::new_v4().to_string();
    let board_id = uuid::Uuid::new_v4().to_string();

    insert_into(projects::table)
        .values(NewProject {
            id: &project_id,
            organization_id,
            name: "Kanban",
            key,
            description: None,
            issue_counter: 0,
            created_at: now,
            updated_at: now,
        })
        .execute(conn)
        .unwrap();
    insert_into(boards::table)
        .values(NewBoard {
            id: &board_id,
            project_id: &project_id,
            name: "Board",
            is_default: true,
            created_at: now,
            updated_at: now,
        })
        .execute(conn)
        .unwrap();

    let columns = [("To Do", "todo"), ("In Progress", "in_progress"), ("Done", "done")]
        .iter()
        .enumerate()
        .map(|(position, &(name, category))| {
            let id = uuid::Uuid::new_v4().to_string();
            insert_into(board_columns::table)
                .values(NewColumn {
                    id: &id,
                    board_id: &board_id,
                    name,
                    description: None,
                    color: "#6b7280",
                    category,
                    position: position as i32,
                    created_at: now,
                    updated_at: now,
                })
                .execute(conn)
                .unwrap();
            id
        })
        .collect();

    SeededBoard {
        project_id,
        board_id,
        columns,
    }
}

/// Inserts a task straight into `column` at `position`, bypassing the
/// ordering engine.
pub fn seed_issue(conn: &mut SqliteConnection, seeded: &SeededBoard, column: Option<&String>, position: i32) -> Issue {
    let now = Utc::now().naive_utc();
    let id = uuid::Uuid::new_v4().to_string();
    let key = Project::next_issue_key(conn, &seeded.project_id).unwrap();

    insert_into(issues::table)
        .values(NewIssue {
            id: &id,
            project_id: &seeded.project_id,
            key: &key,
            title: &key,
            description: None,
            issue_type: "task",
            priority: "medium",
            column_id: column.map(String::as_str),
            position,
            assignee_id: None,
            reporter_id: "user-1",
            story_points: None,
            due_date: None,
            parent_id: None,
            created_at: now,
            updated_at: now,
        })
        .execute(conn)
        .unwrap();

    Issue::find(conn, &id).unwrap().unwrap()
}

pub fn issue_order(conn: &mut SqliteConnection, column_id: &str) -> Vec<String> {
    Issue::in_columns(conn, &[column_id.to_string()])
        .unwrap()
        .into_iter()
        .map(|issue| issue.id)
        .collect()
}

pub fn column_order(conn: &mut SqliteConnection, board_id: &str) -> Vec<String> {
    Column::for_board(conn, board_id)
        .unwrap()
        .into_iter()
        .map(|column| column.id)
        .collect()
}
