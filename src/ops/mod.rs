pub mod activation;
pub mod batch;
pub mod functions;

pub use self::activation::Activation;
pub use self::batch::{axis_broadcast_shape, linear_nd, prepend_dim, reshape_owned};
pub use self::functions::{
    get_cosine_similarity_loss, l1loss, l2loss, sigmoid_cross_entropy_loss, softmax,
    softmax_cross_entropy,
};
