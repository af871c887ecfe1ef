//! Relational layout. Money columns are integer cents.

pub const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        user_id INTEGER PRIMARY KEY,
        username TEXT,
        full_name TEXT,
        balance INTEGER NOT NULL DEFAULT 0,
        bonus_balance INTEGER NOT NULL DEFAULT 0,
        wager_left INTEGER NOT NULL DEFAULT 0,
        wager_total INTEGER NOT NULL DEFAULT 0,
        ref_balance INTEGER NOT NULL DEFAULT 0,
        ref_earnings INTEGER NOT NULL DEFAULT 0,
        ref_count INTEGER NOT NULL DEFAULT 0,
        referrer_id INTEGER REFERENCES accounts(user_id),
        last_claimed_turnover INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_accounts_username ON accounts(username)",
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES accounts(user_id),
        amount INTEGER NOT NULL,
        kind TEXT NOT NULL,
        game TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id, kind)",
    r#"
    CREATE TABLE IF NOT EXISTS vouchers (
        voucher_id TEXT PRIMARY KEY,
        creator_id INTEGER NOT NULL REFERENCES accounts(user_id),
        amount INTEGER NOT NULL CHECK (amount > 0),
        status TEXT NOT NULL DEFAULT 'active',
        kind TEXT NOT NULL,
        cashed_by_id INTEGER,
        target_user_id INTEGER,
        activations_total INTEGER NOT NULL DEFAULT 1,
        password_hash TEXT,
        required_turnover INTEGER NOT NULL DEFAULT 0,
        premium_only INTEGER NOT NULL DEFAULT 0,
        wagering_multiplier TEXT NOT NULL DEFAULT '0',
        comment TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        cashed_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_vouchers_creator ON vouchers(creator_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS voucher_activations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        voucher_id TEXT NOT NULL REFERENCES vouchers(voucher_id),
        user_id INTEGER NOT NULL REFERENCES accounts(user_id),
        amount INTEGER NOT NULL,
        wagering_left INTEGER NOT NULL DEFAULT 0,
        wagering_total INTEGER NOT NULL DEFAULT 0,
        activated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (voucher_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bet_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES accounts(user_id),
        amount INTEGER NOT NULL CHECK (amount > 0),
        game TEXT NOT NULL,
        bet_type TEXT NOT NULL,
        is_bonus_bet INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_bet_queue_status ON bet_queue(status, created_at, id)",
    r#"
    CREATE TABLE IF NOT EXISTS bets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        queue_id INTEGER NOT NULL UNIQUE REFERENCES bet_queue(id),
        user_id INTEGER NOT NULL REFERENCES accounts(user_id),
        amount INTEGER NOT NULL,
        game TEXT NOT NULL,
        bet_type TEXT NOT NULL,
        is_bonus_bet INTEGER NOT NULL DEFAULT 0,
        won INTEGER NOT NULL,
        payout INTEGER NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS withdrawals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES accounts(user_id),
        amount INTEGER NOT NULL CHECK (amount > 0),
        source TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        reference TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        processed_at TEXT
    )
    "#,
];
