//! Route definitions for the `/projects` resource tree.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{assets, experiments, jobs, projects};
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /                                            -> list_projects
/// POST   /                                            -> create_project
/// GET    /{id}                                        -> get_project
/// DELETE /{id}                                        -> delete_project
/// POST   /{id}/refs                                   -> create_reference_asset
/// GET    /{id}/refs                                   -> list_reference_assets
/// GET    /{id}/refs/{rid}                             -> get_reference_asset
/// POST   /{id}/motions                                -> create_motion_asset
/// GET    /{id}/motions                                -> list_motion_assets
/// GET    /{id}/motions/{mid}                          -> get_motion_asset
/// POST   /{id}/experiments                            -> create_experiment
/// GET    /{id}/experiments                            -> list_experiments
/// POST   /{id}/experiments/preprocess                 -> create_experiment_with_preprocess
/// GET    /{id}/experiments/{eid}                      -> get_experiment
/// POST   /{id}/experiments/{eid}/preprocess           -> retry_preprocess
/// POST   /{id}/experiments/{eid}/steadydancer/jobs    -> create_experiment_job
/// GET    /{id}/experiments/{eid}/steadydancer/jobs    -> list_experiment_jobs
/// POST   /{id}/steadydancer/jobs                      -> create_project_job
/// GET    /{id}/steadydancer/jobs                      -> list_project_jobs
/// GET    /{id}/steadydancer/jobs/{jid}                -> get_job_status
/// POST   /{id}/steadydancer/jobs/{jid}/cancel         -> cancel_job
/// GET    /{id}/steadydancer/jobs/{jid}/download       -> download_job_video
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/{id}",
            get(projects::get_project).delete(projects::delete_project),
        )
        .route(
            "/{id}/refs",
            get(assets::list_reference_assets).post(assets::create_reference_asset),
        )
        .route("/{id}/refs/{rid}", get(assets::get_reference_asset))
        .route(
            "/{id}/motions",
            get(assets::list_motion_assets).post(assets::create_motion_asset),
        )
        .route("/{id}/motions/{mid}", get(assets::get_motion_asset))
        .route(
            "/{id}/experiments",
            get(experiments::list_experiments).post(experiments::create_experiment),
        )
        .route(
            "/{id}/experiments/preprocess",
            post(experiments::create_experiment_with_preprocess),
        )
        .route("/{id}/experiments/{eid}", get(experiments::get_experiment))
        .route(
            "/{id}/experiments/{eid}/preprocess",
            post(experiments::retry_preprocess),
        )
        .route(
            "/{id}/experiments/{eid}/steadydancer/jobs",
            get(jobs::list_experiment_jobs).post(jobs::create_experiment_job),
        )
        .route(
            "/{id}/steadydancer/jobs",
            get(jobs::list_project_jobs).post(jobs::create_project_job),
        )
        .route("/{id}/steadydancer/jobs/{jid}", get(jobs::get_job_status))
        .route(
            "/{id}/steadydancer/jobs/{jid}/cancel",
            post(jobs::cancel_job),
        )
        .route(
            "/{id}/steadydancer/jobs/{jid}/download",
            get(jobs::download_job_video),
        )
}
