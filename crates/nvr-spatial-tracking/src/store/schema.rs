//! Relational schema.

pub(super) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS spatial_maps (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    image_url   TEXT,
    width       REAL NOT NULL DEFAULT 0,
    height      REAL NOT NULL DEFAULT 0,
    scale       REAL NOT NULL DEFAULT 1,
    metadata    TEXT NOT NULL DEFAULT '{}',
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS camera_placements (
    id               TEXT PRIMARY KEY,
    camera_id        TEXT NOT NULL,
    map_id           TEXT NOT NULL REFERENCES spatial_maps(id) ON DELETE CASCADE,
    position_x       REAL NOT NULL,
    position_y       REAL NOT NULL,
    rotation         REAL NOT NULL DEFAULT 0,
    fov_angle        REAL NOT NULL DEFAULT 90,
    fov_depth        REAL NOT NULL DEFAULT 100,
    coverage_polygon TEXT NOT NULL DEFAULT '[]',
    mount_height     REAL NOT NULL DEFAULT 0,
    tilt_angle       REAL NOT NULL DEFAULT 0,
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL,
    UNIQUE (camera_id, map_id)
);

CREATE TABLE IF NOT EXISTS camera_transitions (
    id                    TEXT PRIMARY KEY,
    from_camera_id        TEXT NOT NULL,
    to_camera_id          TEXT NOT NULL,
    transition_type       TEXT NOT NULL CHECK (transition_type IN ('overlap', 'adjacent', 'gap')),
    bidirectional         INTEGER NOT NULL DEFAULT 1,
    overlap_zone          TEXT NOT NULL DEFAULT '[]',
    expected_transit_time REAL NOT NULL DEFAULT 0,
    transit_time_variance REAL NOT NULL DEFAULT 0,
    exit_zone             TEXT,
    entry_zone            TEXT,
    avg_transit_time      REAL NOT NULL DEFAULT 0,
    success_rate          REAL NOT NULL DEFAULT 0,
    total_handoffs        INTEGER NOT NULL DEFAULT 0,
    successful_handoffs   INTEGER NOT NULL DEFAULT 0,
    created_at            INTEGER NOT NULL,
    updated_at            INTEGER NOT NULL,
    UNIQUE (from_camera_id, to_camera_id)
);

CREATE TABLE IF NOT EXISTS global_tracks (
    id                    TEXT PRIMARY KEY,
    first_seen            INTEGER NOT NULL,
    last_seen             INTEGER NOT NULL,
    current_camera_id     TEXT NOT NULL DEFAULT '',
    current_local_track   TEXT NOT NULL DEFAULT '',
    object_type           TEXT NOT NULL DEFAULT '',
    embedding             BLOB,
    embedding_confidence  REAL NOT NULL DEFAULT 0,
    dominant_colors       TEXT NOT NULL DEFAULT '[]',
    estimated_height      REAL NOT NULL DEFAULT 0,
    state                 TEXT NOT NULL CHECK (state IN ('active', 'transit', 'pending', 'lost', 'completed')),
    predicted_next_camera TEXT,
    predicted_arrival     INTEGER,
    created_at            INTEGER NOT NULL,
    updated_at            INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS track_segments (
    id              TEXT PRIMARY KEY,
    global_track_id TEXT NOT NULL REFERENCES global_tracks(id) ON DELETE CASCADE,
    camera_id       TEXT NOT NULL,
    local_track_id  TEXT NOT NULL,
    entered_at      INTEGER NOT NULL,
    exited_at       INTEGER,
    exit_direction  TEXT,
    exit_position   TEXT,
    bounding_boxes  TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS pending_handoffs (
    id              TEXT PRIMARY KEY,
    global_track_id TEXT NOT NULL REFERENCES global_tracks(id) ON DELETE CASCADE,
    from_camera_id  TEXT NOT NULL,
    to_camera_ids   TEXT NOT NULL,
    transition_type TEXT NOT NULL CHECK (transition_type IN ('overlap', 'adjacent', 'gap')),
    exited_at       INTEGER NOT NULL,
    expected_by     INTEGER NOT NULL,
    exit_direction  TEXT,
    exit_position   TEXT NOT NULL,
    embedding       BLOB,
    dominant_colors TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_placements_map ON camera_placements(map_id);
CREATE INDEX IF NOT EXISTS idx_placements_camera ON camera_placements(camera_id);
CREATE INDEX IF NOT EXISTS idx_transitions_from ON camera_transitions(from_camera_id);
CREATE INDEX IF NOT EXISTS idx_transitions_to ON camera_transitions(to_camera_id);
CREATE INDEX IF NOT EXISTS idx_tracks_state ON global_tracks(state);
CREATE INDEX IF NOT EXISTS idx_tracks_camera ON global_tracks(current_camera_id);
CREATE INDEX IF NOT EXISTS idx_segments_track ON track_segments(global_track_id);
CREATE INDEX IF NOT EXISTS idx_segments_camera ON track_segments(camera_id);
CREATE INDEX IF NOT EXISTS idx_handoffs_expected ON pending_handoffs(expected_by);
"#;
