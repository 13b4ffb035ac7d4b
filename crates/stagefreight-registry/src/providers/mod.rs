pub mod dockerhub;
pub mod generic;
pub mod ghcr;
pub mod gitea;
pub mod gitlab;
pub mod harbor;
pub mod jfrog;
pub mod local;
pub mod quay;
