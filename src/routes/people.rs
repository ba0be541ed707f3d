use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::db;
use crate::error::ApiResult;
use crate::models::{
    CreateGroupRequest, CreateStudentRequest, CreateTeacherRequest, Group, ListQuery, Student,
    Teacher,
};
use crate::state::AppState;
use crate::validation::Validator;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/teachers", get(list_teachers).post(create_teacher))
        .route("/api/teachers/{id}", get(get_teacher))
        .route("/api/students", get(list_students).post(create_student))
        .route("/api/students/{id}", get(get_student))
        .route("/api/groups", get(list_groups).post(create_group))
        .route("/api/groups/{id}", get(get_group))
}

/// POST /api/teachers
async fn create_teacher(
    State(state): State<AppState>,
    Json(req): Json<CreateTeacherRequest>,
) -> ApiResult<(StatusCode, Json<Teacher>)> {
    Validator::validate_name(&req.name)?;
    let school_id = state.school_or_default(req.school_id.as_deref());

    let teacher = db::insert_teacher(&state.pool, &school_id, &req.name).await?;
    tracing::info!(teacher_id = %teacher.id, school_id = %school_id, "Created teacher");
    Ok((StatusCode::CREATED, Json(teacher)))
}

/// GET /api/teachers?school_id=...
async fn list_teachers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Teacher>>> {
    Ok(Json(
        db::list_teachers(&state.pool, query.school_id.as_deref()).await?,
    ))
}

async fn get_teacher(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Teacher>> {
    Ok(Json(db::get_teacher(&state.pool, &id).await?))
}

/// POST /api/students
async fn create_student(
    State(state): State<AppState>,
    Json(req): Json<CreateStudentRequest>,
) -> ApiResult<(StatusCode, Json<Student>)> {
    Validator::validate_name(&req.name)?;
    let school_id = state.school_or_default(req.school_id.as_deref());
    let phone = req.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());

    let student = db::insert_student(&state.pool, &school_id, &req.name, phone).await?;
    tracing::info!(student_id = %student.id, school_id = %school_id, "Created student");
    Ok((StatusCode::CREATED, Json(student)))
}

async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Student>>> {
    Ok(Json(
        db::list_students(&state.pool, query.school_id.as_deref()).await?,
    ))
}

async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Student>> {
    Ok(Json(db::get_student(&state.pool, &id).await?))
}

/// POST /api/groups
async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<(StatusCode, Json<Group>)> {
    Validator::validate_name(&req.name)?;
    let school_id = state.school_or_default(req.school_id.as_deref());

    let group = db::insert_group(&state.pool, &school_id, &req.name).await?;
    tracing::info!(group_id = %group.id, school_id = %school_id, "Created group");
    Ok((StatusCode::CREATED, Json(group)))
}

async fn list_groups(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Group>>> {
    Ok(Json(
        db::list_groups(&state.pool, query.school_id.as_deref()).await?,
    ))
}

async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Group>> {
    Ok(Json(db::get_group(&state.pool, &id).await?))
}
