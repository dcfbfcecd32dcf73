//! 类型擦除的消息载荷
//!
//! 拦截器只需要对消息做 `Debug` 摘要，因此所有载荷都以 [`AnyMessage`] 形式传递，
//! 业务代码在边界处通过 [`downcast`] 还原为具体类型。

use crate::error::RpcError;
use std::any::{Any, type_name};
use std::fmt;

/// 可在拦截器中传递的消息
pub trait Message: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T> Message for T
where
    T: Any + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

/// 类型擦除后的消息
pub type AnyMessage = Box<dyn Message>;

impl dyn Message {
    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// 装箱为 [`AnyMessage`]
///
/// `Box<dyn Message>` 本身也实现了 [`Message`]，已装箱的消息原样返回，不会再套一层。
pub fn boxed<M: Message>(message: M) -> AnyMessage {
    let mut message = Box::new(message);
    if let Some(inner) = (&mut *message as &mut dyn Any).downcast_mut::<AnyMessage>() {
        return std::mem::replace(inner, Box::new(()) as AnyMessage);
    }
    message
}

/// 将 [`AnyMessage`] 还原为具体类型
///
/// 类型不匹配时返回 `InvalidArgument`。
pub fn downcast<T: Any>(message: AnyMessage) -> Result<T, RpcError> {
    message
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| {
            RpcError::invalid_argument(format!("unexpected message type, want {}", type_name::<T>()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Ping(u32);

    #[test]
    fn downcast_recovers_concrete_type() {
        let msg: AnyMessage = Box::new(Ping(7));
        assert!(msg.as_ref().is::<Ping>());
        assert_eq!(msg.as_ref().downcast_ref::<Ping>(), Some(&Ping(7)));
        assert_eq!(downcast::<Ping>(msg).unwrap(), Ping(7));
    }

    #[test]
    fn downcast_mismatch_is_invalid_argument() {
        let msg: AnyMessage = Box::new("text".to_string());
        let err = downcast::<Ping>(msg).unwrap_err();
        assert_eq!(err.code(), Some(crate::error::OutcomeCode::InvalidArgument));
    }

    #[test]
    fn boxing_an_already_boxed_message_keeps_one_layer() {
        let once: AnyMessage = Box::new(Ping(9));
        let msg = boxed(once);
        assert!(msg.as_ref().is::<Ping>());
        assert_eq!(downcast::<Ping>(msg).unwrap(), Ping(9));

        let plain = boxed(Ping(1));
        assert_eq!(downcast::<Ping>(plain).unwrap(), Ping(1));
    }

    #[test]
    fn debug_formats_inner_value() {
        let msg: AnyMessage = Box::new(Ping(3));
        assert_eq!(format!("{:?}", msg), "Ping(3)");
    }
}
