use std::mem::ManuallyDrop;

/* NOTES:
  - Use the defer! macro to specify a block of cleanup code which should execute when the enclosing
    scope is exited, after the code which follows it in the same scope.
  - Multiple defer! blocks in the same scope execute in reverse (LIFO) order when the scope exits.
  - The deferred block expression is stored inside a ManuallyDrop wrapper held by a named local
    variable; Rust drops that variable when the enclosing scope exits, and the DeferBlock's Drop
    implementation executes the stored block expression exactly once at that point.
*/

// NOTE: we capture the block expression to defer using the macro fragment-specifier "tt" (a Rust
//       TokenTree) so that the full user-supplied block expression is captured
#[macro_export]
macro_rules! defer {
    ( $($block_expression:tt)* ) => {
        // NOTE: the DeferBlock must be stored in a named variable (i.e. not "let _ ="), as an
        //       unnamed instance would be dropped immediately instead of at scope exit
        let __defer_block = $crate::defer_block::DeferBlock::new(|| { $($block_expression)* });
    };
}

// NOTE: we require an FnOnce block expression so that the deferred block cannot be executed twice
pub struct DeferBlock<T>
where
    T: FnOnce(),
{
    deferred_block_expression: ManuallyDrop<T>,
}

impl<T> DeferBlock<T>
where
    T: FnOnce(),
{
    pub fn new(block_expression: T) -> Self {
        DeferBlock {
            deferred_block_expression: ManuallyDrop::new(block_expression),
        }
    }
}

impl<T> Drop for DeferBlock<T>
where
    T: FnOnce(),
{
    fn drop(&mut self) {
        // move the deferred block expression out of our struct instance so that we can execute it;
        // this ManuallyDrop instance must not be used again after the take
        let block_expression = unsafe { ManuallyDrop::take(&mut self.deferred_block_expression) };

        (block_expression)();
    }
}
