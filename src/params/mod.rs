//! # 파라미터 트리
//!
//! 가중치 명세(`WeightParams`)와 실제 배열을 같은 트리 구조로 다룹니다.
//! 명세 트리는 컴포넌트가 소유하고, 실현된 트리는 외부 학습 루프가 소유합니다.

pub mod tree;
pub mod weight;

pub use tree::{ArrayTree, Tree, WeightTree};
pub use weight::{WeightInit, WeightParams};
