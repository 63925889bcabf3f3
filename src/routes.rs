use crate::{
    api::{admin, leave_request, stats},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = build_limiter(config.rate_login_per_min);
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    // Public: credential exchange only.
    cfg.service(
        web::resource(format!("{}/login", config.api_prefix))
            .wrap(login_limiter)
            .route(web::post().to(handlers::login)),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::resource("/requests")
                    .route(web::get().to(leave_request::list_requests))
                    .route(web::post().to(leave_request::create_request)),
            )
            .service(
                web::resource("/requests/{id}")
                    .route(web::put().to(leave_request::update_request))
                    .route(web::delete().to(leave_request::delete_request)),
            )
            .service(web::resource("/years").route(web::get().to(stats::years)))
            .service(web::resource("/stats").route(web::get().to(stats::stats)))
            .service(
                web::resource("/change-password")
                    .route(web::put().to(handlers::change_password)),
            )
            .service(
                web::scope("/admin")
                    .service(web::resource("/dashboard").route(web::get().to(admin::dashboard)))
                    .service(
                        web::resource("/requests/{id}")
                            .route(web::put().to(admin::decide_request)),
                    )
                    .service(
                        web::resource("/employees")
                            .route(web::get().to(admin::list_employees))
                            .route(web::post().to(admin::create_employee)),
                    )
                    .service(
                        web::resource("/settings").route(web::put().to(admin::update_settings)),
                    ),
            ),
    );
}
