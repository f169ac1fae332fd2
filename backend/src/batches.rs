use actix_web::web;

mod archive;
mod crud;
mod enrollment;
mod helpers;
mod ranking;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Literal sub-paths first so they never reach the id routes
        .service(crud::list_my_batches)
        .service(crud::list_active_batches)
        .service(archive::list_archived_batches)
        // Batch CRUD
        .service(crud::list_batches)
        .service(crud::create_batch)
        .service(crud::get_batch)
        .service(crud::update_batch)
        .service(crud::delete_batch)
        // Roster
        .service(enrollment::list_batch_students)
        .service(enrollment::add_student_to_batch)
        .service(enrollment::remove_student_from_batch)
        // Archive
        .service(archive::archive_batch)
        .service(archive::restore_batch);
}
