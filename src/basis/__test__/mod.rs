//! 기저 기하와 기저 집합 생성 테스트
