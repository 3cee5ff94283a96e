//! SQLite schema definition

/// SQL schema for the tutoria database
pub const SCHEMA_SQL: &str = r#"
-- Courses: minimal stand-in for the host platform's course table
CREATE TABLE IF NOT EXISTS courses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);

-- Groups: sections of a course
CREATE TABLE IF NOT EXISTS groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    name TEXT NOT NULL
);

-- Enrollments: a student in a course, optionally through a group
CREATE TABLE IF NOT EXISTS enrollments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL,
    group_id INTEGER REFERENCES groups(id) ON DELETE CASCADE,
    course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    UNIQUE(student_id, course_id)
);

-- Course topics: the classification taxonomy per course
CREATE TABLE IF NOT EXISTS course_topics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    keywords TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

-- Chat sessions: one conversation, optionally scoped to a course
CREATE TABLE IF NOT EXISTS chat_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL,
    course_id INTEGER REFERENCES courses(id) ON DELETE CASCADE,
    name TEXT NOT NULL DEFAULT 'New Chat',
    created_at TEXT NOT NULL
);

-- Chat messages: user and bot turns
CREATE TABLE IF NOT EXISTS chat_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
    sender TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Knowledge files: uploaded course material with chunks and embeddings
CREATE TABLE IF NOT EXISTS knowledge_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    extracted_text TEXT,
    chunks_json TEXT,
    embeddings_json TEXT,
    embedding_backend TEXT,
    embedding_dimension INTEGER,
    processed INTEGER NOT NULL DEFAULT 0,
    processing_error TEXT,
    uploaded_at TEXT NOT NULL
);

-- Topic weights: one unit of classified-topic evidence per user message.
-- The UNIQUE constraint on message_id is what makes concurrent duplicate
-- classification attempts fail the second write.
CREATE TABLE IF NOT EXISTS topic_weights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id INTEGER NOT NULL UNIQUE REFERENCES chat_messages(id) ON DELETE CASCADE,
    student_id INTEGER NOT NULL,
    course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    topic_id INTEGER NOT NULL REFERENCES course_topics(id) ON DELETE CASCADE,
    date TEXT NOT NULL
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_topics_course ON course_topics(course_id);
CREATE INDEX IF NOT EXISTS idx_messages_session ON chat_messages(session_id);
CREATE INDEX IF NOT EXISTS idx_files_course ON knowledge_files(course_id);
CREATE INDEX IF NOT EXISTS idx_weights_student_course ON topic_weights(student_id, course_id);
CREATE INDEX IF NOT EXISTS idx_weights_course_date ON topic_weights(course_id, date);
CREATE INDEX IF NOT EXISTS idx_enrollments_group ON enrollments(group_id);
"#;
