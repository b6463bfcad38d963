//! 인접 리스트 테스트
