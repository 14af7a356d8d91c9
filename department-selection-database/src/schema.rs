// keep in sync with sql/schema.sql

diesel::table! {
    categories (id) {
        id -> Int4,
        name -> Varchar,
        max_selections -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    departments (id) {
        id -> Int4,
        name -> Varchar,
        category_id -> Nullable<Int4>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    members (id) {
        id -> Int4,
        full_name -> Varchar,
        phone -> Varchar,
        email -> Varchar,
        address -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    member_departments (id) {
        id -> Int4,
        member_id -> Int4,
        department_id -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    settings (id) {
        id -> Int4,
        key -> Varchar,
        value -> Varchar,
    }
}

diesel::joinable!(departments -> categories (category_id));
diesel::joinable!(member_departments -> departments (department_id));
diesel::joinable!(member_departments -> members (member_id));

diesel::allow_tables_to_appear_in_same_query!(
    categories,
    departments,
    member_departments,
    members,
    settings,
);
