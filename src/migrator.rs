use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240601_000001_create_label_tables::Migration)]
    }
}

// Migration implementations

mod m20240601_000001_create_label_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_label_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductionLine::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionLine::ProductionLineId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ProductionLine::ProductionLineName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionLine::FactorySnValueToken)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionLine::ModelLookupQuery).text().not_null())
                        .col(ColumnDef::new(ProductionLine::ServerName).string().not_null())
                        .col(ColumnDef::new(ProductionLine::DbName).string().not_null())
                        .col(ColumnDef::new(ProductionLine::User).string().not_null())
                        .col(ColumnDef::new(ProductionLine::Password).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Model::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Model::ModelId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Model::ModelName).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ModelLabel::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ModelLabel::ModelLabelId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ModelLabel::ModelId).integer().not_null())
                        .col(ColumnDef::new(ModelLabel::LabelName).string().not_null())
                        .col(ColumnDef::new(ModelLabel::TemplateName).string().not_null())
                        .col(ColumnDef::new(ModelLabel::TemplatePath).string().not_null())
                        .col(ColumnDef::new(ModelLabel::DisplayFieldQuery).text().null())
                        .col(ColumnDef::new(ModelLabel::LabelFieldQuery).text().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_line_name")
                        .table(ProductionLine::Table)
                        .col(ProductionLine::ProductionLineName)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_model_name")
                        .table(Model::Table)
                        .col(Model::ModelName)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_model_label_model_id")
                        .table(ModelLabel::Table)
                        .col(ModelLabel::ModelId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ModelLabel::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Model::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductionLine::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductionLine {
        #[sea_orm(iden = "ProductionLine")]
        Table,
        #[sea_orm(iden = "ProductionLineID")]
        ProductionLineId,
        #[sea_orm(iden = "ProductionLineName")]
        ProductionLineName,
        #[sea_orm(iden = "FactorySNValueToken")]
        FactorySnValueToken,
        #[sea_orm(iden = "ModelLookupQuery")]
        ModelLookupQuery,
        #[sea_orm(iden = "ServerName")]
        ServerName,
        #[sea_orm(iden = "DBName")]
        DbName,
        #[sea_orm(iden = "User")]
        User,
        #[sea_orm(iden = "Password")]
        Password,
    }

    #[derive(DeriveIden)]
    enum Model {
        #[sea_orm(iden = "Model")]
        Table,
        #[sea_orm(iden = "ModelID")]
        ModelId,
        #[sea_orm(iden = "ModelName")]
        ModelName,
    }

    #[derive(DeriveIden)]
    enum ModelLabel {
        #[sea_orm(iden = "ModelLabel")]
        Table,
        #[sea_orm(iden = "ModelLabelID")]
        ModelLabelId,
        #[sea_orm(iden = "ModelID")]
        ModelId,
        #[sea_orm(iden = "LabelName")]
        LabelName,
        #[sea_orm(iden = "TemplateName")]
        TemplateName,
        #[sea_orm(iden = "TemplatePath")]
        TemplatePath,
        #[sea_orm(iden = "DisplayFieldQuery")]
        DisplayFieldQuery,
        #[sea_orm(iden = "LabelFieldQuery")]
        LabelFieldQuery,
    }
}
