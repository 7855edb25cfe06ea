use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, RuntimeErr, Set,
};
use thiserror::Error;

use crate::db::entities::template;
use crate::db::entities::prelude::*;
use crate::db::enums::{ChannelType, TemplateStatus};
use crate::db::models::{ActiveFlag, NewTemplate, TemplateDto, UpdateTemplate};

/// Separator between the human-readable base name and the module tag in the
/// composite stored name.
pub const MODULE_SEPARATOR: &str = "::";
/// Module assigned when a stored name carries no separator.
pub const DEFAULT_MODULE: &str = "General";

const COPY_SUFFIX: &str = " (Copia)";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("a template named '{0}' already exists")]
    DuplicateName(String),
    #[error("template not found: {0}")]
    NotFound(i32),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

fn is_unique_violation(err: &DbErr) -> bool {
    if let DbErr::Query(RuntimeErr::SqlxError(sqlx_err)) = err {
        if let sqlx::Error::Database(database_err) = sqlx_err {
            return database_err.is_unique_violation();
        }
    }
    false
}

// --- Composite-name helpers ---

/// Composes the stored name. An empty module yields the bare base name,
/// never a trailing separator.
pub fn compose_name(base: &str, module: &str) -> String {
    if module.is_empty() {
        base.to_owned()
    } else {
        format!("{base}{MODULE_SEPARATOR}{module}")
    }
}

/// Splits a stored name into (base, module). Total: a name without a
/// separator is all base, with the module falling back to [`DEFAULT_MODULE`].
pub fn split_name(name: &str) -> (String, String) {
    match name.split_once(MODULE_SEPARATOR) {
        Some((base, module)) => (base.to_owned(), module.to_owned()),
        None => (name.to_owned(), DEFAULT_MODULE.to_owned()),
    }
}

/// Returns the recomposed stored name only when the base name or module
/// actually changed. Unrelated field edits must never rename.
pub fn recompose_if_changed(
    stored_name: &str,
    new_base: Option<&str>,
    new_module: Option<&str>,
) -> Option<String> {
    let (old_base, old_module) = split_name(stored_name);
    let base = new_base.unwrap_or(&old_base);
    let module = new_module.unwrap_or(&old_module);
    if base == old_base && module == old_module {
        None
    } else {
        Some(compose_name(base, module))
    }
}

// --- Active-flag normalization ---

/// Canonicalizes a legacy active-flag representation. Numerics count as
/// active when non-zero; anything unrecognized is treated as inactive.
pub fn normalize_active(raw: &str) -> TemplateStatus {
    let value = raw.trim();
    if let Ok(n) = value.parse::<i64>() {
        return if n != 0 {
            TemplateStatus::Active
        } else {
            TemplateStatus::Inactive
        };
    }
    match value.to_lowercase().as_str() {
        "true" | "activo" | "activa" | "active" | "si" | "sí" | "yes" => TemplateStatus::Active,
        _ => TemplateStatus::Inactive,
    }
}

pub fn status_from_flag(flag: &ActiveFlag) -> TemplateStatus {
    match flag {
        ActiveFlag::Bool(true) => TemplateStatus::Active,
        ActiveFlag::Bool(false) => TemplateStatus::Inactive,
        ActiveFlag::Number(n) if *n != 0 => TemplateStatus::Active,
        ActiveFlag::Number(_) => TemplateStatus::Inactive,
        ActiveFlag::Text(t) => normalize_active(t),
    }
}

/// Enriches a raw row: splits the composite name and normalizes the flag.
pub fn enrich(model: template::Model) -> TemplateDto {
    let (base_name, module) = split_name(&model.name);
    TemplateDto {
        id: model.id,
        base_name,
        module,
        name: model.name,
        channel_type: model.channel_type,
        subject: model.subject,
        body: model.body,
        status: normalize_active(&model.active),
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

/// Stand-in returned to readers holding a reference to a deleted template.
pub fn placeholder(id: i32) -> TemplateDto {
    TemplateDto {
        id,
        name: "(Plantilla eliminada)".to_owned(),
        base_name: "(Plantilla eliminada)".to_owned(),
        module: DEFAULT_MODULE.to_owned(),
        channel_type: ChannelType::Email,
        subject: String::new(),
        body: String::new(),
        status: TemplateStatus::Inactive,
        created_at: DateTime::<Utc>::UNIX_EPOCH,
        updated_at: DateTime::<Utc>::UNIX_EPOCH,
    }
}

// --- Store operations ---

pub async fn create(
    db: &DatabaseConnection,
    input: NewTemplate,
) -> Result<TemplateDto, TemplateError> {
    let base = input.base_name.trim();
    if base.is_empty() {
        return Err(TemplateError::InvalidInput(
            "base name must not be empty".to_owned(),
        ));
    }
    let module = input
        .module
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MODULE);
    let name = compose_name(base, module);
    let status = input
        .active
        .as_ref()
        .map(status_from_flag)
        .unwrap_or(TemplateStatus::Active);

    let now = Utc::now();
    let inserted = template::ActiveModel {
        name: Set(name.clone()),
        channel_type: Set(input.channel_type),
        subject: Set(input.subject),
        body: Set(input.body),
        active: Set(status.as_stored().to_owned()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            TemplateError::DuplicateName(name.clone())
        } else {
            TemplateError::Database(e)
        }
    })?;

    Ok(enrich(inserted))
}

pub async fn get_all(db: &DatabaseConnection) -> Result<Vec<TemplateDto>, TemplateError> {
    let rows = Template::find()
        .order_by_asc(TemplateColumn::Name)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(enrich).collect())
}

pub async fn get_by_id(db: &DatabaseConnection, id: i32) -> Result<TemplateDto, TemplateError> {
    let model = Template::find_by_id(id)
        .one(db)
        .await?
        .ok_or(TemplateError::NotFound(id))?;
    Ok(enrich(model))
}

/// Active templates, optionally restricted to one channel. The legacy
/// flag column cannot be filtered reliably in SQL, so normalization
/// happens after the fetch.
pub async fn get_active(
    db: &DatabaseConnection,
    channel: Option<ChannelType>,
) -> Result<Vec<TemplateDto>, TemplateError> {
    let mut query = Template::find().order_by_asc(TemplateColumn::Name);
    if let Some(channel) = channel {
        query = query.filter(TemplateColumn::ChannelType.eq(channel));
    }
    let rows = query.all(db).await?;
    Ok(rows
        .into_iter()
        .map(enrich)
        .filter(|t| t.status == TemplateStatus::Active)
        .collect())
}

/// Templates tagged with the given module. Rows without a separator carry
/// the implicit fallback module, so the filter runs on split names.
pub async fn get_by_module(
    db: &DatabaseConnection,
    module: &str,
) -> Result<Vec<TemplateDto>, TemplateError> {
    let rows = Template::find()
        .order_by_asc(TemplateColumn::Name)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(enrich)
        .filter(|t| t.module == module)
        .collect())
}

pub async fn search(
    db: &DatabaseConnection,
    term: &str,
) -> Result<Vec<TemplateDto>, TemplateError> {
    let rows = Template::find()
        .filter(
            TemplateColumn::Name
                .contains(term)
                .or(TemplateColumn::Subject.contains(term))
                .or(TemplateColumn::Body.contains(term)),
        )
        .order_by_asc(TemplateColumn::Name)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(enrich).collect())
}

pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    input: UpdateTemplate,
) -> Result<TemplateDto, TemplateError> {
    let model = Template::find_by_id(id)
        .one(db)
        .await?
        .ok_or(TemplateError::NotFound(id))?;

    let new_base = input.base_name.as_deref().map(str::trim);
    if new_base.is_some_and(str::is_empty) {
        return Err(TemplateError::InvalidInput(
            "base name must not be empty".to_owned(),
        ));
    }
    let new_module = input
        .module
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());
    let rename = recompose_if_changed(&model.name, new_base, new_module);
    // Name reported on a uniqueness conflict; the stored name when the
    // edit does not rename.
    let conflict_name = rename.clone().unwrap_or_else(|| model.name.clone());

    let mut active_model = model.into_active_model();
    if let Some(name) = rename {
        active_model.name = Set(name);
    }
    if let Some(channel_type) = input.channel_type {
        active_model.channel_type = Set(channel_type);
    }
    if let Some(subject) = input.subject {
        active_model.subject = Set(subject);
    }
    if let Some(body) = input.body {
        active_model.body = Set(body);
    }
    if let Some(flag) = input.active {
        active_model.active = Set(status_from_flag(&flag).as_stored().to_owned());
    }
    active_model.updated_at = Set(Utc::now());

    let updated = active_model.update(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            TemplateError::DuplicateName(conflict_name.clone())
        } else {
            TemplateError::Database(e)
        }
    })?;
    Ok(enrich(updated))
}

pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), TemplateError> {
    let result = Template::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(TemplateError::NotFound(id));
    }
    Ok(())
}

/// Clones a template under a "(Copia)" base-name suffix, forced inactive.
pub async fn duplicate(db: &DatabaseConnection, id: i32) -> Result<TemplateDto, TemplateError> {
    let model = Template::find_by_id(id)
        .one(db)
        .await?
        .ok_or(TemplateError::NotFound(id))?;

    let (base, module) = split_name(&model.name);
    let name = compose_name(&format!("{base}{COPY_SUFFIX}"), &module);
    let now = Utc::now();
    let inserted = template::ActiveModel {
        name: Set(name.clone()),
        channel_type: Set(model.channel_type),
        subject: Set(model.subject),
        body: Set(model.body),
        active: Set(TemplateStatus::Inactive.as_stored().to_owned()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            TemplateError::DuplicateName(name.clone())
        } else {
            TemplateError::Database(e)
        }
    })?;
    Ok(enrich(inserted))
}
