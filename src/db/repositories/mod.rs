pub mod timeline_repository;
