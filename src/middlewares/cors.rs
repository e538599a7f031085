use actix_cors::Cors;

pub fn create_cors() -> Cors {
    Cors::default()
        // TODO: restrict to the storefront origin once it is configurable
        .allowed_origin_fn(|_, _req_head| true)
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}
