/// Define an enum grouping several message types into one, so a single
/// channel can fan-in messages produced by distinct peers.
///
/// `fan_in_message_type!(Msg[Msg1, Msg2] : Debug);` expands to:
///
/// ```no_run
/// # use bridge_actors::Message;
/// # #[derive(Debug)]
/// # struct Msg1;
/// # #[derive(Debug)]
/// # struct Msg2;
/// #[derive(Debug)]
/// enum Msg {
///     Msg1(Msg1),
///     Msg2(Msg2),
/// }
/// impl From<Msg1> for Msg {
///     fn from(m: Msg1) -> Msg {
///         Msg::Msg1(m)
///     }
/// }
/// impl From<Msg2> for Msg {
///     fn from(m: Msg2) -> Msg {
///         Msg::Msg2(m)
///     }
/// }
/// ```
#[macro_export]
macro_rules! fan_in_message_type {
    ( $t:ident [ $( $x:ident ),* ] : $( $trait:ident ),* ) => {
        #[derive($( $trait ),*)]
        pub enum $t {
            $(
                $x($x),
            )*
        }
        $(
            impl From<$x> for $t {
                fn from(m: $x) -> $t {
                    $t::$x(m)
                }
            }
        )*
    };
}
