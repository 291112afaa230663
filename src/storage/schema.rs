pub const CREATE_CLIENTS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS clients (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        themecolor TEXT NOT NULL,
        password TEXT NOT NULL DEFAULT '',
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT ''
    )
";

pub const CREATE_POSTS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        clientid TEXT NOT NULL,
        date TEXT NOT NULL,
        day TEXT NOT NULL DEFAULT '',
        dayofweek TEXT NOT NULL DEFAULT '',
        title TEXT NOT NULL DEFAULT '',
        type TEXT NOT NULL DEFAULT '',
        posttype TEXT NOT NULL DEFAULT '',
        text TEXT NOT NULL DEFAULT '',
        completed INTEGER NOT NULL DEFAULT 0,
        notes TEXT NOT NULL DEFAULT '',
        images TEXT NOT NULL DEFAULT '[]',
        socialnetworks TEXT NOT NULL DEFAULT '[]',
        month INTEGER,
        year INTEGER,
        time TEXT,
        FOREIGN KEY (clientid) REFERENCES clients(id) ON DELETE CASCADE
    )
";

pub const CREATE_POST_IMAGES_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS post_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL,
        url TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
    )
";

pub const CREATE_INDEX_POSTS_CLIENT: &str =
    "CREATE INDEX IF NOT EXISTS idx_posts_clientid ON posts(clientid)";

pub const CREATE_INDEX_POSTS_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_posts_date ON posts(date)";

pub const CREATE_INDEX_POST_IMAGES_POST: &str =
    "CREATE INDEX IF NOT EXISTS idx_post_images_post_id ON post_images(post_id)";
