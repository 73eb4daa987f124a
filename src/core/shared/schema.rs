diesel::table! {
    crm_users (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        password_hash -> Text,
        role -> Int2,
        team_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    crm_teams (id) {
        id -> Uuid,
        name -> Varchar,
        members -> Array<Uuid>,
        leader_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    crm_contacts (id) {
        id -> Uuid,
        owner_id -> Uuid,
        name -> Varchar,
        email -> Nullable<Varchar>,
        phone -> Nullable<Varchar>,
        company -> Nullable<Varchar>,
        lead_stage -> Int2,
        unit_type -> Int2,
        project_suggestion -> Nullable<Text>,
        remark -> Nullable<Text>,
        team_lead_id -> Nullable<Uuid>,
        lead_source -> Int2,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    crm_deals (id) {
        id -> Uuid,
        owner_id -> Uuid,
        contact_id -> Uuid,
        name -> Varchar,
        value -> Float8,
        stage -> Int2,
        close_date -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    crm_tasks (id) {
        id -> Uuid,
        owner_id -> Uuid,
        contact_id -> Uuid,
        content -> Text,
        is_completed -> Bool,
        due_date -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    crm_appointments (id) {
        id -> Uuid,
        owner_id -> Uuid,
        contact_id -> Uuid,
        title -> Varchar,
        appointment_time -> Timestamptz,
        duration_minutes -> Int4,
        notes -> Nullable<Text>,
        status -> Int2,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    crm_activities (id) {
        id -> Uuid,
        user_id -> Uuid,
        action_type -> Varchar,
        related_model -> Nullable<Varchar>,
        related_id -> Nullable<Uuid>,
        details -> Jsonb,
        timestamp -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    crm_users,
    crm_teams,
    crm_contacts,
    crm_deals,
    crm_tasks,
    crm_appointments,
    crm_activities,
);
