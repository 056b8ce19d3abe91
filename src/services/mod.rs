/// Registration, lifecycle, and read surfaces of the championship.
pub mod championship_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Dashboard and match event construction and broadcasting.
pub mod events;
/// Per-game turn loop against the remote agents.
pub mod game_driver;
/// Health check service.
pub mod health_service;
/// Four-game match orchestration with banks and the setup probe.
pub mod match_runner;
/// Round-robin execution over the bounded worker pool.
pub mod scheduler;
/// Server-Sent Events forwarding.
pub mod sse_service;
