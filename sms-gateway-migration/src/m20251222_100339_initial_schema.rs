use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sql = r#"
            CREATE TABLE "accounts" (
                "id" uuid PRIMARY KEY,
                "api_key" varchar(100) NOT NULL UNIQUE,
                "balance" integer NOT NULL DEFAULT 0,
                "created_at" timestamp NOT NULL DEFAULT (now() at time zone 'utc')
            );

            CREATE INDEX "idx_accounts_api_key" ON "accounts" ("api_key");

            CREATE TABLE "sms" (
                "id" uuid NOT NULL,
                "account_id" uuid NOT NULL REFERENCES "accounts" ("id"),
                "phone_number" varchar(20) NOT NULL,
                "message" varchar(70) NOT NULL,
                "sms_type" smallint NOT NULL DEFAULT 1,
                "status" smallint NOT NULL DEFAULT 1,
                "created_at" timestamp NOT NULL DEFAULT (now() at time zone 'utc'),
                "sent_at" timestamp,
                PRIMARY KEY ("id", "created_at")
            ) PARTITION BY RANGE ("created_at");

            CREATE TABLE "sms_2025_12" PARTITION OF "sms" FOR VALUES FROM ('2025-12-01') TO ('2026-01-01');
            CREATE TABLE "sms_2026_01" PARTITION OF "sms" FOR VALUES FROM ('2026-01-01') TO ('2026-02-01');
            CREATE TABLE "sms_2026_02" PARTITION OF "sms" FOR VALUES FROM ('2026-02-01') TO ('2026-03-01');
            CREATE TABLE "sms_2026_03" PARTITION OF "sms" FOR VALUES FROM ('2026-03-01') TO ('2026-04-01');
            CREATE TABLE "sms_2026_04" PARTITION OF "sms" FOR VALUES FROM ('2026-04-01') TO ('2026-05-01');
            CREATE TABLE "sms_2026_05" PARTITION OF "sms" FOR VALUES FROM ('2026-05-01') TO ('2026-06-01');
            CREATE TABLE "sms_2026_06" PARTITION OF "sms" FOR VALUES FROM ('2026-06-01') TO ('2026-07-01');
            CREATE TABLE "sms_2026_07" PARTITION OF "sms" FOR VALUES FROM ('2026-07-01') TO ('2026-08-01');
            CREATE TABLE "sms_2026_08" PARTITION OF "sms" FOR VALUES FROM ('2026-08-01') TO ('2026-09-01');
            CREATE TABLE "sms_2026_09" PARTITION OF "sms" FOR VALUES FROM ('2026-09-01') TO ('2026-10-01');
            CREATE TABLE "sms_2026_10" PARTITION OF "sms" FOR VALUES FROM ('2026-10-01') TO ('2026-11-01');
            CREATE TABLE "sms_2026_11" PARTITION OF "sms" FOR VALUES FROM ('2026-11-01') TO ('2026-12-01');
            CREATE TABLE "sms_2026_12" PARTITION OF "sms" FOR VALUES FROM ('2026-12-01') TO ('2027-01-01');
            CREATE TABLE "sms_default" PARTITION OF "sms" DEFAULT;

            CREATE INDEX "idx_sms_account_created" ON "sms" ("account_id", "created_at");
            CREATE INDEX "idx_sms_account_status" ON "sms" ("account_id", "status", "created_at");
            CREATE INDEX "idx_sms_status" ON "sms" ("status");
            CREATE INDEX "idx_sms_created" ON "sms" ("created_at");

            COMMENT ON TABLE "accounts" IS 'Tenant accounts with prepaid message balances';

            COMMENT ON TABLE "sms" IS 'Messages, range-partitioned by month of created_at';
        "#;
        crate::from_sql(manager, sql).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sql = r#"
            DROP TABLE "sms";
            DROP TABLE "accounts";
        "#;

        crate::from_sql(manager, sql).await
    }
}
