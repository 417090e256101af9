//! Esquema Diesel (generado manualmente). Reemplazable con `diesel print-schema`.

diesel::table! {
    source_content (content_id) {
        content_id -> Text,
        content -> Text,
        content_length -> Int4,
    }
}

diesel::table! {
    summary (summary_id) {
        summary_id -> Text,
        source_id -> Text,
        output -> Nullable<Text>,
        output_length -> Nullable<Int4>,
        model -> Text,
        params -> Jsonb,
        status -> Text,
        started_at -> Timestamptz,
        ended_at -> Nullable<Timestamptz>,
        language -> Text,
        warnings -> Jsonb,
        request_count -> Int8,
        source_type -> Text,
        file_type -> Nullable<Text>,
        start_page -> Nullable<Int4>,
        end_page -> Nullable<Int4>,
    }
}

diesel::table! {
    identifier_binding (raw_id) {
        raw_id -> Text,
        canonical_id -> Text,
        cache -> Bool,
        last_accessed -> Timestamptz,
    }
}

diesel::joinable!(summary -> source_content (source_id));
diesel::joinable!(identifier_binding -> summary (canonical_id));

diesel::allow_tables_to_appear_in_same_query!(
    source_content,
    summary,
    identifier_binding,
);
