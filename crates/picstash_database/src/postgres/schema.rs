// Kept in sync with migrations/ by hand.

diesel::table! {
    images (id) {
        id -> Uuid,
        seq -> Int8,
        title -> Text,
        description -> Text,
        lock_file -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        file_updated_at -> Timestamptz,
        file_size -> Int8,
        file_type -> Text,
        blob_key -> Text,
        content_hash -> Text,
        version -> Int8,
    }
}

diesel::table! {
    tags (id) {
        id -> Uuid,
        label -> Text,
        color -> Text,
    }
}

diesel::table! {
    image_tags (image_id, tag_id) {
        image_id -> Uuid,
        tag_id -> Uuid,
        position -> Int4,
    }
}

diesel::joinable!(image_tags -> images (image_id));
diesel::joinable!(image_tags -> tags (tag_id));

diesel::allow_tables_to_appear_in_same_query!(images, tags, image_tags);
