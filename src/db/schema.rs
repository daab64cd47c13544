diesel::table! {
    projects (id) {
        id -> Text,
        organization_id -> Text,
        name -> Text,
        key -> Text,
        description -> Nullable<Text>,
        issue_counter -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    boards (id) {
        id -> Text,
        project_id -> Text,
        name -> Text,
        is_default -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    board_columns (id) {
        id -> Text,
        board_id -> Text,
        name -> Text,
        description -> Nullable<Text>,
        color -> Text,
        category -> Text,
        position -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    issues (id) {
        id -> Text,
        project_id -> Text,
        key -> Text,
        title -> Text,
        description -> Nullable<Text>,
        issue_type -> Text,
        priority -> Text,
        column_id -> Nullable<Text>,
        position -> Integer,
        assignee_id -> Nullable<Text>,
        reporter_id -> Text,
        story_points -> Nullable<Integer>,
        due_date -> Nullable<Timestamp>,
        parent_id -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    github_links (id) {
        id -> Text,
        issue_id -> Text,
        kind -> Text,
        reference -> Text,
        title -> Nullable<Text>,
        url -> Text,
        created_at -> Timestamp,
    }
}

diesel::joinable!(boards -> projects (project_id));
diesel::joinable!(board_columns -> boards (board_id));
diesel::joinable!(issues -> projects (project_id));
diesel::joinable!(issues -> board_columns (column_id));
diesel::joinable!(github_links -> issues (issue_id));

diesel::allow_tables_to_appear_in_same_query!(
    boards,
    board_columns,
    github_links,
    issues,
    projects,
);
